// Events emitted towards the UI/store collaborator

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::model::{
    names_match, AirportCandidate, BatchRequest, City, ComparisonType, PriceEstimate,
};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    BatchRequested {
        request: BatchRequest,
    },
    AirportsLoaded {
        city_name: String,
        airports: Vec<AirportCandidate>,
    },
    PriceSucceeded {
        payload: PriceEstimate,
        city: City,
    },
    // Names the failing city
    DataError {
        message: String,
    },
    AllDataLoaded,
    ComparisonChanged {
        compare: ComparisonType,
    },
    ProductChanged {
        product: String,
    },
    TimerTick,
}

impl FetchEvent {
    pub fn data_error(message: impl Into<String>) -> Self {
        FetchEvent::DataError {
            message: message.into(),
        }
    }

    // True for the events that settle a city pipeline
    pub fn is_terminal_for(&self, city_name: &str) -> bool {
        match self {
            FetchEvent::PriceSucceeded { city, .. } => city.is_named(city_name),
            FetchEvent::DataError { message } => names_match(message, city_name),
            _ => false,
        }
    }
}

pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: FetchEvent);
}

impl EventSink for UnboundedSender<FetchEvent> {
    fn emit(&self, event: FetchEvent) {
        // A dropped receiver means nobody is listening any more
        if let Err(err) = self.send(event) {
            trace!(event = ?err.0, "event receiver closed");
        }
    }
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FetchEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FetchEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<FetchEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&FetchEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn data_errors_for(&self, city_name: &str) -> usize {
        self.count(|e| {
            matches!(e, FetchEvent::DataError { message } if names_match(message, city_name))
        })
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: FetchEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_event_log_keeps_order() {
        let log = EventLog::new();
        log.emit(FetchEvent::TimerTick);
        log.emit(FetchEvent::data_error("Austin"));
        log.emit(FetchEvent::AllDataLoaded);

        assert_eq!(
            log.events(),
            vec![
                FetchEvent::TimerTick,
                FetchEvent::data_error("Austin"),
                FetchEvent::AllDataLoaded,
            ]
        );
        assert_eq!(log.data_errors_for("Austin"), 1);
        assert_eq!(log.take().len(), 3);
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_tolerates_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(FetchEvent::TimerTick);
        assert_eq!(rx.recv().await, Some(FetchEvent::TimerTick));

        drop(rx);
        tx.emit(FetchEvent::AllDataLoaded);
    }

    #[test]
    fn test_terminal_events_match_city() {
        let success = FetchEvent::PriceSucceeded {
            payload: serde_json::json!({}),
            city: City::new("Boston"),
        };
        assert!(success.is_terminal_for("boston"));
        assert!(FetchEvent::data_error("Boston").is_terminal_for("Boston"));
        assert!(!FetchEvent::AllDataLoaded.is_terminal_for("Boston"));
    }

    #[test]
    fn test_name_checks_agree_beyond_ascii() {
        let log = EventLog::new();
        log.emit(FetchEvent::data_error("MÜNCHEN"));

        assert_eq!(log.data_errors_for("münchen"), 1);
        assert!(FetchEvent::data_error("MÜNCHEN").is_terminal_for("München"));
        assert!(City::new("MÜNCHEN").is_named("münchen"));
    }
}
