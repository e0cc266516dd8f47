use std::{env::current_dir, fs::write, path::PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use ksc_core::{ical::generator::Emitter, startplan_client};

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the output file path
    pub output_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    let calendar = startplan_client::get(Local::now().date_naive()).await?;
    let path = match args.output_file {
        Some(path) => path,
        None => {
            let mut path = current_dir()?;
            path.push("kinostarts_calendar.ics");
            path
        }
    };
    write(&path, calendar.generate())?;
    println!(
        "Generated {} events and wrote to {}",
        calendar.events.len(),
        path.display()
    );
    Ok(())
}
