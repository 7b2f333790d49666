//! `open <url>`: check a `tomatobar://` URL and print the command it maps
//! to. A running `run` session accepts the same URLs on stdin.

use clap::Args;
use tomatobar_core::parse_command_url;

#[derive(Args)]
pub struct OpenArgs {
    /// Command URL, e.g. tomatobar://startstop
    url: String,
}

pub fn run(args: OpenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let command = parse_command_url(&args.url)?;
    let json = serde_json::json!({ "url": args.url, "command": command });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
