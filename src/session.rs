use crate::blob::BlobStore;
use crate::form::{FormEdit, FormState};
use crate::models::EndpointDescriptor;
use crate::render::{Payload, ResultView, View};
use crate::template::{self, SplitPath};
use std::time::Duration;

/// Identifies one request issued from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of one request as reported by the executor.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub payload: Result<Payload, String>,
}

/// State of the endpoint currently open in the console.
///
/// Opening a descriptor starts a new generation. Results from older
/// generations are dropped; within a generation the most recently received
/// result wins, whatever order the requests were sent in.
#[derive(Debug)]
pub struct Session {
    generation: u64,
    next_seq: u64,
    descriptor: Option<EndpointDescriptor>,
    split: SplitPath,
    form: FormState,
    in_flight: usize,
    current: Option<ResultView>,
    blobs: BlobStore,
}

impl Session {
    pub fn new(max_blob_bytes: usize) -> Self {
        Session {
            generation: 0,
            next_seq: 0,
            descriptor: None,
            split: SplitPath {
                base_path: String::new(),
                params: Vec::new(),
            },
            form: FormState::default(),
            in_flight: 0,
            current: None,
            blobs: BlobStore::new(max_blob_bytes),
        }
    }

    pub fn open(&mut self, descriptor: EndpointDescriptor) {
        self.generation += 1;
        self.split = template::split(&descriptor.path);
        self.form = FormState::seed(&descriptor, &self.split);
        self.descriptor = Some(descriptor);
        self.in_flight = 0;
        self.replace_current(None);
    }

    pub fn descriptor(&self) -> Option<&EndpointDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn edit(&mut self, edit: FormEdit) {
        self.form = std::mem::take(&mut self.form).apply(edit);
    }

    /// Display template of the open descriptor.
    pub fn template(&self) -> Option<String> {
        self.descriptor
            .as_ref()
            .map(|d| template::to_template(&d.path, d.params.as_ref()))
    }

    /// Concrete request URL: undeclared query keys keep their literal value,
    /// declared keys take the form value. Declared keys absent from the path
    /// are appended after the path's own keys.
    pub fn request_url(&self) -> Option<String> {
        let descriptor = self.descriptor.as_ref()?;

        let from_path = self.split.params.iter().map(|(key, literal)| {
            let value = if descriptor.declares(key) {
                self.form.get(key)
            } else {
                Some(literal.as_str())
            };
            (key.as_str(), value)
        });
        let extra = self
            .form
            .iter()
            .filter(|(key, _)| self.split.get(key).is_none())
            .map(|(key, value)| (key, Some(value)));

        Some(template::to_request_url(&self.split.base_path, from_path.chain(extra)))
    }

    /// Marks a request as sent.
    pub fn begin(&mut self) -> Option<Ticket> {
        self.descriptor.as_ref()?;
        self.in_flight += 1;
        self.next_seq += 1;
        Some(Ticket {
            generation: self.generation,
            seq: self.next_seq,
        })
    }

    /// Records a finished request. Returns whether it became the displayed
    /// result.
    pub fn complete(&mut self, ticket: Ticket, outcome: Outcome) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!("dropping result #{} for a closed endpoint", ticket.seq);
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        let view = match outcome.payload {
            Ok(payload) => View::materialize(payload, &mut self.blobs),
            Err(message) => View::Error(message),
        };
        self.replace_current(Some(ResultView {
            status: outcome.status,
            elapsed: outcome.elapsed,
            view,
        }));
        true
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight > 0
    }

    pub fn current(&self) -> Option<&ResultView> {
        self.current.as_ref()
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    fn replace_current(&mut self, next: Option<ResultView>) {
        if let Some(blob) = self.current.as_ref().and_then(|r| r.view.blob()) {
            self.blobs.release(blob);
        }
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MediaKind;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn descriptor(path: &str, keys: &[&str]) -> EndpointDescriptor {
        EndpointDescriptor {
            name: "YouTube MP3".to_string(),
            path: path.to_string(),
            method: Default::default(),
            params: Some(
                keys.iter()
                    .map(|k| (k.to_string(), "value".to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            desc: String::new(),
        }
    }

    fn text(body: &str) -> Outcome {
        Outcome {
            status: Some(200),
            elapsed: Duration::from_millis(1),
            payload: Ok(Payload::Text(body.to_string())),
        }
    }

    fn media() -> Outcome {
        Outcome {
            status: Some(200),
            elapsed: Duration::from_millis(1),
            payload: Ok(Payload::Media {
                kind: MediaKind::Image,
                mime: "image/png".to_string(),
                body: Bytes::from_static(b"png"),
            }),
        }
    }

    #[test]
    fn request_url_merges_literals_and_edits() {
        let mut session = Session::new(1024);
        session.open(descriptor("/api/search?q=cats&limit=5", &["q", "page"]));
        session.edit(FormEdit::Set {
            key: "q".to_string(),
            value: "big dogs".to_string(),
        });
        assert_eq!(
            session.request_url().as_deref(),
            Some("/api/search?q=big%20dogs&limit=5&page=")
        );
        assert_eq!(
            session.template().as_deref(),
            Some("/api/search?q={q}&limit=5")
        );
    }

    #[test]
    fn unmodified_form_reproduces_original_query() {
        let mut session = Session::new(1024);
        let path = "/api/tools?a=1&b=two&c=3";
        session.open(descriptor(path, &["b"]));
        let rebuilt = session.request_url().unwrap();
        let original: std::collections::BTreeSet<_> = template::split(path).params.into_iter().collect();
        let again: std::collections::BTreeSet<_> = template::split(&rebuilt).params.into_iter().collect();
        assert_eq!(original, again);
    }

    #[test]
    fn latest_received_result_wins() {
        let mut session = Session::new(1024);
        session.open(descriptor("/api/ping", &[]));
        let first = session.begin().unwrap();
        let second = session.begin().unwrap();
        assert!(session.is_sending());

        assert!(session.complete(second, text("second")));
        assert!(session.is_sending());
        assert!(session.complete(first, text("first")));
        assert!(!session.is_sending());
        assert_eq!(session.current().unwrap().view, View::Text("first".to_string()));
    }

    #[test]
    fn stale_results_are_dropped_and_never_stick_the_indicator() {
        let mut session = Session::new(1024);
        session.open(descriptor("/api/a", &[]));
        let stale = session.begin().unwrap();
        session.open(descriptor("/api/b", &[]));
        assert!(!session.is_sending());

        let fresh = session.begin().unwrap();
        assert!(!session.complete(stale, text("old")));
        assert!(session.is_sending());
        assert!(session.complete(fresh, text("new")));
        assert!(!session.is_sending());
        assert_eq!(session.current().unwrap().view, View::Text("new".to_string()));
    }

    #[test]
    fn superseded_blobs_are_released() {
        let mut session = Session::new(1024);
        session.open(descriptor("/api/img", &[]));
        for _ in 0..5 {
            let ticket = session.begin().unwrap();
            session.complete(ticket, media());
        }
        assert_eq!(session.blobs().live(), 1);

        session.open(descriptor("/api/other", &[]));
        assert_eq!(session.blobs().live(), 0);
    }

    #[test]
    fn nothing_to_send_without_descriptor() {
        let mut session = Session::new(1024);
        assert!(session.begin().is_none());
        assert!(session.request_url().is_none());
    }
}
