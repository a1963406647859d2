//! Server-sent event bridge between a live subscription and an HTTP response.

use std::{convert::Infallible, sync::Arc};

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use futures::Stream;

use crate::{
    application::notify::{ChangeNotifier, SubscriptionId},
    domain::posts::PostId,
};

pub const CONNECTED_EVENT: &str = "connected";
pub const CONNECTED_MESSAGE: &str = "SSE connection established";

/// Unregisters its subscription when the response stream is dropped.
struct SubscriptionGuard {
    notifier: Arc<ChangeNotifier>,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.notifier.unsubscribe_id(self.id);
    }
}

/// Subscribe to `post_id` and yield a `connected` event followed by one
/// data event per notification.
pub fn live_events(
    notifier: Arc<ChangeNotifier>,
    post_id: PostId,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let mut subscription = notifier.subscribe(post_id);
    let guard = SubscriptionGuard {
        notifier,
        id: subscription.id(),
    };

    stream! {
        let _guard = guard;
        yield Ok(Event::default().event(CONNECTED_EVENT).data(CONNECTED_MESSAGE));
        while let Some(message) = subscription.recv().await {
            yield Ok(Event::default().data(message));
        }
    }
}

/// Finalise a live subscription into an Axum SSE response.
pub fn live_response(notifier: Arc<ChangeNotifier>, post_id: PostId) -> Response {
    Sse::new(live_events(notifier, post_id))
        .keep_alive(KeepAlive::default())
        .into_response()
}
