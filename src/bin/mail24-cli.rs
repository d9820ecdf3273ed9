//! CLI for 24mail disposable inboxes

use clap::{Parser, Subcommand};
use mail24_client::{Client, Message};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail24-cli")]
#[command(
    about = "Use 24mail.chacuo.net disposable inboxes (unofficial)",
    arg_required_else_help = true
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Mailbox name (random when omitted)
    #[arg(long, global = true, env = "MAIL24_NAME")]
    name: Option<String>,

    /// Prefix prepended to the mailbox name
    #[arg(long, global = true, default_value = "")]
    prefix: String,

    /// Mailbox domain
    #[arg(long, global = true, env = "MAIL24_DOMAIN", default_value = "chacuo.net")]
    domain: String,

    /// Service root URL
    #[arg(long, global = true, env = "MAIL24_BASE_URL")]
    base_url: Option<String>,

    /// Proxy URL (optional)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Register the mailbox and print its address
    Address,

    /// List messages in the inbox
    List {
        /// Also load and print each message body
        #[arg(long)]
        content: bool,
    },

    /// Show a single message by its MID
    Show {
        /// Message identifier
        id: String,
    },

    /// Release and refresh the mailbox
    Renew,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let client = connect(&args).await?;

    match &args.command {
        Command::Address => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &json!({"name": client.name(), "address": client.address()})
                    )?
                );
            } else {
                println!("{}", client.address());
            }
        }
        Command::List { content } => cmd_list(&client, &args, *content).await?,
        Command::Show { id } => cmd_show(&client, &args, id).await?,
        Command::Renew => {
            let result = client.renew().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Renewed {}", client.address());
            }
        }
    }

    Ok(())
}

async fn connect(args: &Args) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .prefix(&args.prefix)
        .suffix(&args.domain);

    if let Some(name) = &args.name {
        builder = builder.name(name);
    }
    if let Some(base_url) = &args.base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(proxy) = &args.proxy {
        builder = builder.proxy(proxy);
    }

    Ok(builder.build().await?)
}

async fn cmd_list(client: &Client, args: &Args, content: bool) -> anyhow::Result<()> {
    let messages = client.receive().await?;

    if args.json {
        let mut out = Vec::with_capacity(messages.len());
        for msg in &messages {
            out.push(message_json(msg, content).await?);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Mailbox: {}", client.address());
    if messages.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    println!("Found {} message(s):", messages.len());
    for (idx, msg) in messages.iter().enumerate() {
        let marker = if msg.is_read { ' ' } else { '*' };
        println!("{}.{marker} [{}] {msg}", idx + 1, msg.id);
        if content {
            println!("{}", msg.content().await?.unwrap_or_default());
        }
    }

    Ok(())
}

async fn cmd_show(client: &Client, args: &Args, id: &str) -> anyhow::Result<()> {
    let messages = client.receive().await?;
    let msg = messages
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| anyhow::anyhow!("no message with id {id} in {}", client.address()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message_json(msg, true).await?)?);
    } else {
        println!("Subject: {}", msg.subject);
        println!("From:    {}", msg.from);
        println!("To:      {}", msg.to);
        println!("Date:    {}", msg.send_time);
        println!();
        println!("{}", msg.content().await?.unwrap_or_default());
    }

    Ok(())
}

async fn message_json(msg: &Message, content: bool) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(msg)?;
    if content {
        value["content"] = json!(msg.content().await?);
    }
    Ok(value)
}
