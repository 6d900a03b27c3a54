//! parley - terminal chat client

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use parley_client::commands::{parse_input, Input, ParseError, HELP};
use parley_client::{CallbackObserver, ChatClient, ChatEvent, ConfigLoader, ConnectionState, Deferred};
use parley_protocol::is_valid_channel_name;
use parley_utils::{init_logging_with_config, LogConfig, ParleyError, Result};

mod cli;

use cli::Args;

/// Prompt session state
struct Session {
    client: ChatClient,
    timeout: Duration,
    /// Channel plain text goes to
    current: Option<String>,
}

impl Session {
    /// Await a deferred result, bounded by the configured timeout
    async fn wait<T>(&self, deferred: Deferred<T>) -> Result<T> {
        tokio::time::timeout(self.timeout, deferred)
            .await
            .map_err(|_| {
                ParleyError::protocol(format!(
                    "no reply from server within {} ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    fn channel_or_current(&self, channel: Option<String>) -> Result<String> {
        channel
            .or_else(|| self.current.clone())
            .ok_or_else(|| ParleyError::invalid_input("No channel given and none joined"))
    }

    /// Handle one prompt line; false ends the session
    async fn handle_line(&mut self, line: &str) -> bool {
        match parse_input(line) {
            Err(ParseError::Empty) => true,
            Err(e) => {
                println!("error: {}", e);
                true
            }
            Ok(Input::Quit) => false,
            Ok(input) => {
                if let Err(e) = self.execute(input).await {
                    println!("error: {}", e);
                }
                true
            }
        }
    }

    async fn execute(&mut self, input: Input) -> Result<()> {
        match input {
            Input::Join(channel) => {
                let joined = self.wait(self.client.join_channel(&channel).await?).await?;
                println!("Joined {} ({})", joined.name, joined.members.join(" "));
                self.current = Some(joined.name);
            }
            Input::Part(channel) => {
                let channel = self.channel_or_current(channel)?;
                self.wait(self.client.part_channel(&channel).await?).await?;
                println!("Left {}", channel);
                if self.current.as_deref() == Some(channel.as_str()) {
                    self.current = self.client.joined_channels().into_iter().next();
                }
            }
            Input::Names(channel) => {
                let channel = self.channel_or_current(channel)?;
                let names = self.wait(self.client.names_in_channel(&channel).await?).await?;
                println!("{}: {}", channel, names.join(" "));
            }
            Input::List => {
                let channels = self.wait(self.client.offered_channels().await?).await?;
                if channels.is_empty() {
                    println!("No channels");
                } else {
                    println!("Channels: {}", channels.join(" "));
                }
            }
            Input::Time => {
                let time = self.wait(self.client.server_time().await?).await?;
                println!("Server time: {}", time.format("%Y-%m-%d %H:%M:%S"));
            }
            Input::Info => {
                let text = self.wait(self.client.info().await?).await?;
                println!("{}", text);
            }
            Input::Ping(token) => {
                let token = token.unwrap_or_else(|| Local::now().timestamp_millis().to_string());
                let sent = std::time::Instant::now();
                let pong = self.wait(self.client.ping(&token).await?).await?;
                println!("PONG {} ({} ms)", pong, sent.elapsed().as_millis());
            }
            Input::Msg { target, body } => {
                self.wait(self.client.send_message(&target, &body).await?).await?;
            }
            Input::Say(text) => {
                let channel = self
                    .current
                    .clone()
                    .ok_or_else(|| ParleyError::invalid_input("Join a channel first"))?;
                self.wait(self.client.send_message(&channel, &text).await?).await?;
            }
            Input::Help => println!("{}", HELP),
            Input::Unknown(name) => println!("Unknown command /{} (try /help)", name),
            Input::Quit => {}
        }
        Ok(())
    }

    /// Print an observer event; false once the connection is gone
    fn show_event(&self, event: ChatEvent) -> bool {
        match event {
            ChatEvent::Message(message) => {
                if is_valid_channel_name(message.target()) {
                    println!("{} {}", message.target(), message);
                } else {
                    println!("(private) {}", message);
                }
            }
            ChatEvent::Joined { nick, channel } => println!("* {} joined {}", nick, channel),
            ChatEvent::Parted { nick, channel } => println!("* {} left {}", nick, channel),
            ChatEvent::Quit { nick } => println!("* {} quit", nick),
            ChatEvent::ServerError(text) => println!("! {}", text),
            ChatEvent::ConnectionError(text) => {
                println!("! {}", text);
                return false;
            }
        }
        true
    }

    async fn quit(&self) {
        if self.client.state() == ConnectionState::Disconnected {
            return;
        }
        match self.client.disconnect().await {
            Ok(closing) => {
                if let Err(e) = self.wait(closing).await {
                    warn!("Disconnect did not complete: {}", e);
                }
            }
            Err(e) => warn!("Disconnect failed: {}", e),
        }
    }
}

/// Connect and run the prompt until /quit, end of input or connection loss
async fn run_client(args: Args) -> Result<()> {
    let config = ConfigLoader::load_and_validate(args.config.as_deref())?;
    let client = ChatClient::with_config(&config);

    let (tx, mut events) = mpsc::channel(config.observers.event_queue);
    client.add_observer(Arc::new(CallbackObserver::new(move |event| {
        if let Err(e) = tx.try_send(event) {
            warn!("Dropping chat event: {}", e);
        }
    })));

    client.connect(&args.host, args.port, &args.nick).await?;
    println!("Connected: {}", client);
    println!("Type /help for commands");

    let mut session = Session {
        client,
        timeout: config.request_timeout(),
        current: None,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !session.handle_line(&line).await {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = events.recv() => {
                if !session.show_event(event) {
                    break;
                }
            }
        }
    }

    session.quit().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    init_logging_with_config(LogConfig::client())?;
    info!("parley client starting");

    let result = run_client(args).await;
    if let Err(e) = &result {
        error!("parley client error: {}", e);
    }
    result
}
