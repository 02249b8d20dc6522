use std::io;
use std::time::Duration;

use shelfdesk_agent::runtime::AgentRuntime;
use shelfdesk_core::config::AppConfig;
use shelfdesk_core::domain::conversation::{SessionId, TurnRequest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::Level;

use crate::commands::{async_runtime, load_config, prepared_pool, CommandResult};

pub const DEFAULT_IDLE_SECS: u64 = 300;

/// Why the conversation loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatEnd {
    Farewell,
    IdleTimeout,
    InputClosed,
}

pub fn run(session: Option<String>, idle_secs: u64) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    init_logging(&config);

    let session_id = session
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(SessionId)
        .unwrap_or_else(SessionId::generate);
    let idle = Duration::from_secs(idle_secs.max(1));

    let result = runtime.block_on(async {
        let pool = prepared_pool(&config).await?;
        let agent = AgentRuntime::from_config(&config, pool.clone())
            .map_err(|error| ("runtime_init", error.to_string(), 3u8))?;

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let ended = converse(&agent, session_id, stdin, &mut stdout, idle)
            .await
            .map_err(|error| ("terminal_io", error.to_string(), 7u8));

        pool.close().await;
        ended
    });

    match result {
        Ok(_) => CommandResult { exit_code: 0, output: String::new() },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Runs the prompt loop until the customer says goodbye, goes quiet for `idle`, or closes input.
pub async fn converse<R, W>(
    agent: &AgentRuntime,
    session_id: SessionId,
    input: R,
    output: &mut W,
    idle: Duration,
) -> io::Result<ChatEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    say(output, &agent.greeting()).await?;

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let line = match tokio::time::timeout(idle, lines.next_line()).await {
            Err(_) => {
                output.write_all(b"\n").await?;
                say(output, &agent.phrases().idle_farewell()).await?;
                if let Err(error) = agent.reset(&session_id).await {
                    tracing::warn!(
                        event_name = "cli.chat.reset_failed",
                        session_id = %session_id,
                        error = %error,
                        "could not clear idle session"
                    );
                }
                return Ok(ChatEnd::IdleTimeout);
            }
            Ok(Ok(None)) => return Ok(ChatEnd::InputClosed),
            Ok(Ok(Some(line))) => line,
            Ok(Err(error)) => return Err(error),
        };

        let request = TurnRequest { session_id: session_id.clone(), message: line };
        match agent.handle_turn(request).await {
            Ok(reply) => {
                say(output, &reply.response).await?;
                if let Some(follow_up) = &reply.follow_up {
                    say(output, follow_up).await?;
                }
                if reply.end_chat {
                    return Ok(ChatEnd::Farewell);
                }
            }
            Err(error) => {
                let interface = error.into_interface(session_id.as_str());
                tracing::warn!(
                    event_name = "cli.chat.turn_failed",
                    correlation_id = interface.correlation_id(),
                    error = %interface,
                    "turn failed"
                );
                say(output, interface.user_message()).await?;
            }
        }
    }
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> io::Result<()> {
    output.write_all(format!("Assistant: {text}\n").as_bytes()).await?;
    output.flush().await
}

/// Logs go to stderr so they never interleave with the transcript on stdout.
fn init_logging(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}
