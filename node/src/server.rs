use std::net::SocketAddr;

use axum_server::Server;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::routes::router;
use crate::state::NodeState;

/// Serve the agent on an already-bound listener until `shutdown` flips to true.
pub async fn serve_agent(
    listener: TcpListener,
    state: NodeState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    let name = state.agent.name().to_string();
    let app = router(state);

    let server = Server::from_tcp(listener.into_std()?).serve(app.into_make_service());

    info!(node = %name, %addr, "node agent listening");

    tokio::select! {
        res = server => { res?; }
        _ = async {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() { break; }
            }
        } => {}
    }

    info!(node = %name, "node agent stopped");

    Ok(())
}
