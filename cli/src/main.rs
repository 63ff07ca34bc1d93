mod arg_parser;
mod client;

use arg_parser::{ArgParser, SubCommand};
use clap::Parser;
use client::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ArgParser::parse();
    let client = Client::new(&args.server);

    match args.sub_command {
        SubCommand::Submit {
            file,
            kind,
            owner,
            prompt,
        } => {
            let job_id = client
                .submit(&file, &kind, &owner, prompt.as_deref())
                .await?;
            println!("{job_id}");
        }
        SubCommand::Status { job_id } => {
            let status = client.status(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        SubCommand::Fetch { job_id, output } => {
            let path = client.fetch(job_id, output).await?;
            println!("{}", path.display());
        }
        SubCommand::Cancel { job_id } => {
            client.cancel(job_id).await?;
            println!("canceled {job_id}");
        }
    }
    Ok(())
}
