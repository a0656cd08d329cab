use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use static_website::config::DEFAULT_PROJECT;
use static_website::domain::decompose;
use static_website::verify::verify_site;
use static_website::{crawl, InMemoryProvider, SiteConfig, StaticWebsite};

#[derive(Parser, Debug)]
#[command(name = "static-website", about = "Provision a CDN fronted static website")]
struct Cli {
    /// `.env` style file with pathToWebsiteContents, targetDomain, includeWwwSubDomain, ...
    #[arg(short, long, default_value = "site.env", global = true)]
    config: PathBuf,

    /// deployment stack name, used for tagging
    #[arg(long, default_value = "dev", global = true)]
    stack: String,

    #[arg(long, default_value = DEFAULT_PROJECT, global = true)]
    project: String,

    /// log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print every resource in dependency order, as JSON
    Plan,
    /// apply the site against an in-memory engine, then apply it again to check nothing new is created
    Simulate,
    /// check the live site answers and the raw distribution address is blocked
    Verify {
        /// the distribution's `*.cloudfront.net` domain
        #[arg(long)]
        edge_domain: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = SiteConfig::from_dot_env(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let site = StaticWebsite::for_project(config, &cli.stack, &cli.project)?;

    match cli.command {
        Command::Plan => {
            let content = crawl(&site.config().content_path).context("reading website contents")?;
            let plan = site.plan(&content)?;
            let ordered = plan.ordered()?;
            println!("{}", serde_json::to_string_pretty(&ordered)?);
        }
        Command::Simulate => {
            let content = crawl(&site.config().content_path).context("reading website contents")?;
            let zone = decompose(&site.config().target_domain)?.parent_zone;
            let provider = InMemoryProvider::new().with_zone(&zone);
            let outputs = site.apply(&provider, &content).await?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);

            let created = provider.creation_count();
            site.apply(&provider, &content).await.context("second apply")?;
            let again = provider.creation_count() - created;
            info!("{created} resources created, {again} more on re-apply");
            if again != 0 {
                bail!("re-applying created {again} additional resources: {:?}", &provider.creations()[created..]);
            }
        }
        Command::Verify { edge_domain } => {
            let domain = site.config().target_domain.clone();
            let report = tokio::task::spawn_blocking(move || verify_site(&domain, &edge_domain)).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed() {
                bail!("site verification failed");
            }
        }
    }
    Ok(())
}
