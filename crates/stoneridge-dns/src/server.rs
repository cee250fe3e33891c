//! Single-threaded accept loop (spec §5: "the DNS agent serialises requests
//! via its single-threaded accept loop... not safe to scale beyond one
//! instance per host").

use std::net::TcpListener;

use stoneridge_types::Result;

use crate::backend::DnsBackend;
use crate::protocol::handle_one;

pub fn serve(addr: &str, backend: &dyn DnsBackend) -> Result<()> {
    backend.save_dns()?;

    let listener = TcpListener::bind(addr).map_err(|e| anyhow::anyhow!("binding {addr}: {e}"))?;
    tracing::info!(addr, "dns agent listening");
    accept_loop(&listener, backend)
}

fn accept_loop(listener: &TcpListener, backend: &dyn DnsBackend) -> Result<()> {
    for conn in listener.incoming() {
        let mut stream = match conn {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };
        if let Err(e) = handle_one(&mut stream, backend) {
            tracing::error!(error = %e, "connection handling failed");
        }
    }
    Ok(())
}
