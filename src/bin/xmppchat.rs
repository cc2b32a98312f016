/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::env;
use std::io;
use std::io::BufRead;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use xmpp_session::Event;
use xmpp_session::Iq;
use xmpp_session::IqPayload;
use xmpp_session::IqType;
use xmpp_session::Jid;
use xmpp_session::OutgoingStanza;
use xmpp_session::QName;
use xmpp_session::StanzaWriter;
use xmpp_session::TlsMode;
use xmpp_session::XmppClient;
use xmpp_session::XmppError;
use xmpp_session::constants::ns;

/// Chat over XMPP from the terminal.
///
/// Lines typed as `<jid> <text>` are sent as chat messages, `/quit` ends
/// the session.
#[derive(Parser)]
#[command(name = "xmppchat", version = xmpp_session::VERSION, about)]
struct Cli {
    /// Account address, like juliet@example.com
    #[arg(short, long, env = "XMPP_JID")]
    jid: String,

    /// Server as host or host:port, the account domain if not given
    #[arg(long, env = "XMPP_HOST")]
    host: Option<String>,

    /// Resource to bind, the server picks one if not given
    #[arg(short, long)]
    resource: Option<String>,

    /// Do not encrypt the connection
    #[arg(long, conflicts_with = "direct_tls")]
    no_tls: bool,

    /// Start TLS right after connecting instead of using STARTTLS
    #[arg(long)]
    direct_tls: bool,

    /// Accept any server certificate
    #[arg(long)]
    skip_verify: bool,

    /// Establish a legacy session after binding
    #[arg(long)]
    legacy_session: bool,

    /// Seconds between keepalive pings, 0 disables them
    #[arg(long, default_value_t = 60)]
    ping_period: u64,

    /// Seconds to wait for a ping answer
    #[arg(long, default_value_t = 30)]
    ping_timeout: u64,

    /// Status text of the initial presence
    #[arg(long, default_value = "")]
    status: String,
}

fn password() -> Result<String, XmppError> {
    match env::var("XMPP_PASSWORD") {
        Ok(password) => Ok(password),
        Err(_) => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn tls_mode(cli: &Cli) -> TlsMode {
    if cli.no_tls {
        TlsMode::Disabled
    } else if cli.direct_tls {
        TlsMode::Direct
    } else {
        TlsMode::StartTls
    }
}

fn read_input(writer: StanzaWriter) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!("Cannot read input: {err}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        let Some((to, text)) = line.split_once(' ') else {
            eprintln!("Type <jid> <text>, or /quit");
            continue;
        };
        if let Err(err) = writer.send(&OutgoingStanza::chat(to, "chat", text.trim())) {
            error!("Cannot send: {err}");
            return;
        }
    }
    if let Err(err) = writer.close() {
        debug!("Close: {err}");
    }
}

fn answer_request(client: &XmppClient, iq: &Iq) -> Result<(), XmppError> {
    let (Some(id), true) = (iq.id.as_deref(), iq.kind == IqType::Get) else {
        return Ok(());
    };
    let from = iq.from.as_deref().unwrap_or(client.domain());
    if iq.payload == Some(IqPayload::Ping) {
        return client.send(&OutgoingStanza::pong(client.jid().full(), from, id));
    }
    let version_query = QName::new(ns::VERSION, "query");
    if iq.extensions.iter().any(|child| child.name == version_query) {
        return client.send(&OutgoingStanza::version_result(
            from,
            id,
            "xmppchat",
            xmpp_session::VERSION,
            env::consts::OS,
        ));
    }
    debug!("Ignoring request {id} from {from}");
    Ok(())
}

fn run(cli: Cli) -> Result<(), XmppError> {
    let jid = Jid::new(&cli.jid)?;
    let mut builder = XmppClient::build(jid)
        .password(&password()?)
        .host(cli.host.clone())
        .resource(cli.resource.clone())
        .tls(tls_mode(&cli))
        .skip_verify(cli.skip_verify)
        .legacy_session(cli.legacy_session)
        .presence("", &cli.status);
    if cli.ping_period > 0 {
        builder = builder.keepalive(
            Duration::from_secs(cli.ping_period),
            Duration::from_secs(cli.ping_timeout),
        );
    }
    let mut client = builder.connect()?;
    info!("Connected as {}", client.jid());

    let writer = client.writer();
    thread::Builder::new()
        .name("xmppchat-input".to_string())
        .spawn(move || read_input(writer))?;

    while let Some(event) = client.recv()? {
        match event {
            Event::Chat(chat) => {
                if let Some(error) = &chat.error {
                    warn!("Message error from {}: {error}", chat.remote);
                } else if !chat.text.is_empty() {
                    println!("{}: {}", chat.remote, chat.text);
                }
                if let Some(oob) = &chat.oob {
                    println!("{}: {}", chat.remote, oob.url);
                }
            }
            Event::Presence(presence) => {
                let state = presence
                    .kind
                    .or(presence.show)
                    .unwrap_or_else(|| "available".to_string());
                info!("{} is {state}", presence.from.unwrap_or_default());
            }
            Event::Roster(roster) => {
                for item in roster.data.items {
                    info!("Contact {}", item.jid);
                }
            }
            Event::PingResult { id, .. } => debug!("Server answered ping {id}"),
            Event::Iq(iq) => answer_request(&client, &iq)?,
            other => debug!("Unhandled event {other:?}"),
        }
    }
    if client.keepalive_timed_out() {
        warn!("Server stopped answering pings");
    }
    if let Err(err) = client.close() {
        debug!("Close: {err}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
