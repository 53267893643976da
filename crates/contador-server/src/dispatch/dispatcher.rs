use std::net::SocketAddr;

use bytes::Bytes;

use contador_core::error::{CoapError, Result};
use contador_core::protocol::option::{self, OBSERVE_DEREGISTER, OBSERVE_REGISTER};
use contador_core::protocol::{Code, Message, MessageType, Method};

use crate::context::ServerContext;
use crate::observe::{ObserverKey, Registration};

/// A readable resource. Representations are rendered on demand.
pub trait Resource: Send + Sync {
    /// Path in `/segment` form.
    fn path(&self) -> &str;

    /// Current representation returned to GET.
    fn get(&self) -> Bytes;

    fn content_format(&self) -> u32 {
        option::CONTENT_FORMAT_TEXT_PLAIN
    }
}

/// Options this server understands; any other critical option is rejected.
const KNOWN_OPTIONS: [u16; 6] = [
    option::URI_HOST,
    option::OBSERVE,
    option::URI_PORT,
    option::URI_PATH,
    option::URI_QUERY,
    option::ACCEPT,
];

/// Build the response to a request (CON => piggybacked ACK, NON => NON).
pub fn handle_request(ctx: &ServerContext, peer: SocketAddr, req: &Message) -> Message {
    let mut resp = match req.mtype {
        MessageType::Confirmable => {
            Message::new(MessageType::Acknowledgement, Code::CONTENT, req.message_id)
        }
        _ => Message::new(
            MessageType::NonConfirmable,
            Code::CONTENT,
            ctx.next_message_id(),
        ),
    }
    .with_token(req.token.clone());

    if let Err(e) = serve(ctx, peer, req, &mut resp) {
        tracing::debug!(
            %peer,
            path = %req.uri_path(),
            code = %e.response_code(),
            error = %e,
            "request rejected"
        );
        resp.code = e.response_code();
        resp.options.clear();
        resp.payload = Bytes::from(e.to_string());
    }
    resp
}

fn serve(ctx: &ServerContext, peer: SocketAddr, req: &Message, resp: &mut Message) -> Result<()> {
    if let Some(o) = req
        .options
        .iter()
        .find(|o| option::is_critical(o.number) && !KNOWN_OPTIONS.contains(&o.number))
    {
        return Err(CoapError::BadOption(o.number));
    }

    let path = req.uri_path();
    let resource = ctx
        .resource_for(&path)
        .ok_or_else(|| CoapError::NotFound(path.clone()))?;

    let method = req.code.method();
    if method != Some(Method::Get) {
        let name = method.map(Method::as_str).unwrap_or("unknown");
        return Err(CoapError::MethodNotAllowed(format!("{name} {path}")));
    }

    tracing::info!(%peer, %path, "received GET request");

    match req.observe()? {
        Some(OBSERVE_REGISTER) => {
            let key = ObserverKey::new(peer, req.token.clone());
            if let Registration::Replaced(victim) = resource.observers().register(key) {
                tracing::warn!(
                    %peer,
                    %path,
                    evicted = %victim.peer,
                    "observer limit reached, oldest observer evicted"
                );
            }
            resp.set_observe(resource.current_seq());
        }
        Some(OBSERVE_DEREGISTER) => {
            let key = ObserverKey::new(peer, req.token.clone());
            if resource.observers().deregister(&key) {
                tracing::info!(%peer, %path, "observer deregistered");
            }
        }
        _ => {}
    }

    resp.code = Code::CONTENT;
    resp.set_content_format(resource.content_format());
    resp.payload = resource.get();
    Ok(())
}
