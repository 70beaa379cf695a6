//! The event loop: accept connections, pump sockets through channels, and
//! run handlers to completion between waits. Everything shares one thread;
//! sessions live in the server state and tasks reach them by id, so no
//! locking is involved beyond `RefCell` discipline (never held across an
//! await).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;

use ragol_pkt::Version;

use crate::client::{Client, SessionId};
use crate::config::ServerBehavior;
use crate::handlers;
use crate::proxy::{process_frame, ProxyEnv, ProxySession};
use crate::state::ServerState;

const READ_BUF_LEN: usize = 0x1000;
const FLUSH_TICK: Duration = Duration::from_millis(50);

pub type SharedState = Rc<RefCell<ServerState>>;

/// Accepts game-server connections on one listener, treating each as the
/// role configured for that port.
pub async fn run_listener(
    state: SharedState,
    listener: TcpListener,
    version: Version,
    behavior: ServerBehavior,
    tasks: &LocalSet,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let id = {
            let mut st = state.borrow_mut();
            let id = st.alloc_session_id();
            st.insert_client(Client::new(id, version, behavior));
            id
        };
        tracing::info!(%id, %peer, %version, "accepted connection");

        let state = state.clone();
        tasks.spawn_local(async move {
            if let Err(e) = run_session(state.clone(), id, stream).await {
                tracing::info!(%id, error = %e, "session ended");
            }
            let _ = handlers::on_disconnect(&mut state.borrow_mut(), id);
            state.borrow_mut().remove_client(id);
        });
    }
}

async fn run_session(state: SharedState, id: SessionId, mut stream: TcpStream) -> Result<()> {
    handlers::on_connect(&mut state.borrow_mut(), id)?;

    let idle_timeout = state.borrow().config.idle_timeout;
    let mut buf = [0u8; READ_BUF_LEN];
    let mut tick = tokio::time::interval(FLUSH_TICK);

    loop {
        // Flush whatever handlers (ours or a peer's fan-out) queued.
        let pending = {
            let mut st = state.borrow_mut();
            match st.client_mut(id) {
                Some(c) => c.channel.take_outbound(),
                None => return Ok(()),
            }
        };
        for chunk in pending {
            stream.write_all(&chunk).await?;
        }

        tokio::select! {
            read = stream.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                let frames = {
                    let mut st = state.borrow_mut();
                    let client = st.client_mut(id).context("client vanished")?;
                    client.channel.drain_incoming(&buf[..n])?
                };
                let mut st = state.borrow_mut();
                for frame in &frames {
                    handlers::handle_frame(&mut st, id, frame)?;
                }
            }
            _ = tick.tick() => {
                let timed_out = {
                    let st = state.borrow();
                    st.client(id)
                        .map(|c| c.last_recv.elapsed() > idle_timeout)
                        .unwrap_or(true)
                };
                if timed_out {
                    tracing::info!(%id, "idle timeout");
                    return Ok(());
                }
            }
        }
    }
}

/// Runs one proxy session to completion: both sockets feed the pipeline,
/// and the pipeline's verdicts flow out of the opposite channel. A silent
/// upstream redirect replaces the server socket without the client noticing.
pub async fn run_proxy_session(
    env: Rc<ProxyEnv>,
    session: Rc<RefCell<ProxySession>>,
    mut client_stream: TcpStream,
    mut server_stream: TcpStream,
) -> Result<()> {
    let mut client_buf = [0u8; READ_BUF_LEN];
    let mut server_buf = [0u8; READ_BUF_LEN];

    loop {
        // Drain both outbound queues before sleeping.
        let (client_out, server_out) = {
            let mut s = session.borrow_mut();
            (
                s.client_channel.take_outbound(),
                s.server_channel.take_outbound(),
            )
        };
        for chunk in client_out {
            client_stream.write_all(&chunk).await?;
        }
        for chunk in server_out {
            server_stream.write_all(&chunk).await?;
        }

        // Follow a patcher redirect before reading anything else: no byte
        // may be read from the old upstream once its ciphers are gone.
        let reconnect = {
            let mut s = session.borrow_mut();
            if s.pending_silent_reconnect {
                s.pending_silent_reconnect = false;
                s.next_destination
            } else {
                None
            }
        };
        if let Some((addr, port)) = reconnect {
            let dest = std::net::SocketAddr::from((addr, port));
            tracing::info!(%dest, "silently following upstream redirect");
            server_stream = TcpStream::connect(dest).await?;
            session.borrow_mut().server_channel.reset_stream();
            continue;
        }

        tokio::select! {
            read = client_stream.read(&mut client_buf) => {
                let n = read?;
                if n == 0 {
                    session.borrow_mut().disconnect();
                    return Ok(());
                }
                pump_side(&env, &session, false, &client_buf[..n])?;
            }
            read = server_stream.read(&mut server_buf) => {
                let n = read?;
                if n == 0 {
                    session.borrow_mut().disconnect();
                    return Ok(());
                }
                pump_side(&env, &session, true, &server_buf[..n])?;
            }
        }
    }
}

fn pump_side(
    env: &ProxyEnv,
    session: &Rc<RefCell<ProxySession>>,
    from_server: bool,
    bytes: &[u8],
) -> Result<()> {
    let frames = {
        let mut s = session.borrow_mut();
        let ch = if from_server {
            &mut s.server_channel
        } else {
            &mut s.client_channel
        };
        ch.drain_incoming(bytes)?
    };
    let mut s = session.borrow_mut();
    for frame in frames {
        process_frame(
            env,
            &mut s,
            from_server,
            frame.command,
            frame.flag,
            frame.payload.to_vec(),
        )?;
    }
    Ok(())
}
