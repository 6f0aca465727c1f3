use clap::Parser as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use textile::{Options, Parser};

#[derive(clap::Parser)]
#[command(name = "textile")]
#[command(about = "Convert Textile markup to HTML")]
struct Args {
    /// Input file; standard input when omitted
    file: Option<PathBuf>,

    /// Print the JsonML node tree instead of HTML
    #[arg(long)]
    jsonml: bool,

    /// Keep single newlines inside blocks instead of emitting <br />
    #[arg(long)]
    no_breaks: bool,

    /// JSON file with parser options
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,
}

fn main() -> Result<(), textile::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut options = match &args.options {
        Some(path) => Options::from_json(&fs::read_to_string(path)?)?,
        None => Options::default(),
    };
    if args.no_breaks {
        options = options.without_breaks();
    }

    let input = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    log::info!("converting {} bytes", input.len());

    let parser = Parser::new(options);
    if args.jsonml {
        let nodes: Vec<serde_json::Value> = parser.parse(&input).iter().map(|n| n.to_jsonml()).collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        print!("{}", parser.html(&input));
    }
    Ok(())
}
