use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatstream.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("chatstream.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatstream.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatstream.stream.events");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatstream.stream.bytes");
pub(crate) static STREAM_FRAMES_DISCARDED: Counter =
    Counter::new("chatstream.stream.frames_discarded");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatstream.stream.errors");
pub(crate) static STREAM_SILENT_TERMINATIONS: Counter =
    Counter::new("chatstream.stream.silent_terminations");
pub(crate) static STREAM_ABORTS: Counter = Counter::new("chatstream.stream.aborts");
pub(crate) static STREAM_FIRST_EVENT: Moments =
    Moments::new("chatstream.stream.first_event_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("chatstream.stream.duration_seconds");

pub(crate) static STORE_APPENDS_DROPPED: Counter =
    Counter::new("chatstream.store.appends_dropped");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAMES_DISCARDED);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_SILENT_TERMINATIONS);
    collector.register_counter(&STREAM_ABORTS);
    collector.register_moments(&STREAM_FIRST_EVENT);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&STORE_APPENDS_DROPPED);
}
