use std::{
    io::{self, BufRead as _},
    thread,
};

use clap::Parser;
use color_eyre::eyre::Result;
use eyre::{eyre, WrapErr as _};
use irc_engine::{
    command::Command,
    display,
    logging,
    net::CONNECT_TIMEOUT,
    ServerInfo, SessionController,
};
use log::*;

const DEFAULT_PORT: u16 = 6667;
const DEFAULT_TLS_PORT: u16 = 6697;

/// a line based IRC client
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// the server to connect to
    host: String,
    /// defaults to 6697 with --tls and 6667 without
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    nick: String,
    /// defaults to the nick
    #[arg(short, long)]
    username: Option<String>,
    /// defaults to the nick
    #[arg(long)]
    real_name: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    tls: bool,
    /// accept any TLS certificate
    #[arg(long)]
    no_verify: bool,
    /// channels to join once connected
    #[arg(short, long)]
    join: Vec<String>,
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl From<&Args> for ServerInfo {
    fn from(args: &Args) -> Self {
        ServerInfo {
            nick: args.nick.clone(),
            real_name: args.real_name.clone().unwrap_or_else(|| args.nick.clone()),
            username: args.username.clone().unwrap_or_else(|| args.nick.clone()),
            host: args.host.clone(),
            port: args.port.unwrap_or(if args.tls {
                DEFAULT_TLS_PORT
            } else {
                DEFAULT_PORT
            }),
            password: args.password.clone(),
            secure: args.tls,
            tls_verification: !args.no_verify,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_path =
        logging::init(&args.host, args.log_level).wrap_err("could not set up logging")?;
    info!("logging to {}", log_path.display());

    let (mut session, events) = SessionController::new();
    thread::Builder::new()
        .name(String::from("events"))
        .spawn(move || {
            for event in events {
                if let Some(line) = display::format_event(&event) {
                    println!("{}", line);
                }
            }
        })?;

    let (id, connected) = session.connect(ServerInfo::from(&args));
    for channel in &args.join {
        session.join_channel(id, channel, None)?;
    }
    connected
        .recv()
        .map_err(|_| eyre!("the connection thread stopped"))?
        .wrap_err_with(|| format!("could not connect to {}", args.host))?;

    let mut current = args.join.first().cloned();
    let mut quit_reason = None;
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        let next = match &command {
            Command::Quit(reason) => {
                quit_reason = reason.clone();
                break;
            }
            Command::Join { channel, .. } => Some(channel.clone()),
            Command::Query(nick) => Some(nick.clone()),
            Command::Msg { target, .. } => Some(target.clone()),
            _ => None,
        };

        if let Err(e) = command.run(&mut session, id, current.as_deref()) {
            eprintln!("{}", e);
            continue;
        }
        if next.is_some() {
            current = next;
        }
    }

    // wait for the QUIT to go out
    let closed = session.disconnect(id, quit_reason)?;
    if let Ok(Err(e)) = closed.recv_timeout(CONNECT_TIMEOUT) {
        warn!("error while disconnecting: {}", e);
    }
    Ok(())
}
