//! Speech hand-off.
//!
//! The pipeline never talks to a TTS engine directly. It composes an
//! `Utterance` and passes it to a `SpeechSink`, which forwards it to whatever
//! context owns audio.

use std::collections::BTreeSet;
use std::sync::mpsc::{Receiver, Sender};

/// One thing to say.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
    pub labels: Vec<String>,
    pub text: String,
    /// Drop queued or in-progress speech before speaking this.
    pub flush: bool,
}

/// Build the phrase for a set of labels. `None` when there is nothing to say.
pub fn compose_utterance(labels: &BTreeSet<String>) -> Option<Utterance> {
    let labels: Vec<String> = labels.iter().cloned().collect();
    let text = match labels.as_slice() {
        [] => return None,
        [single] => format!("I see a {}", single),
        many => format!("I see: {}", many.join(", ")),
    };
    Some(Utterance {
        labels,
        text,
        flush: true,
    })
}

/// Receiver of utterances. Contract: speak now.
pub trait SpeechSink: Send {
    fn speak(&mut self, utterance: Utterance);
}

/// Forwards utterances over a channel to the audio context.
pub struct ChannelSpeechSink {
    tx: Sender<Utterance>,
}

impl ChannelSpeechSink {
    pub fn new() -> (Self, Receiver<Utterance>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Self { tx }, rx)
    }
}

impl SpeechSink for ChannelSpeechSink {
    fn speak(&mut self, utterance: Utterance) {
        if self.tx.send(utterance).is_err() {
            log::debug!("speech receiver dropped; utterance discarded");
        }
    }
}

/// Writes utterances to the log. Used when no audio output is attached.
#[derive(Debug, Default)]
pub struct LogSpeechSink;

impl SpeechSink for LogSpeechSink {
    fn speak(&mut self, utterance: Utterance) {
        log::info!("speak: \"{}\"", utterance.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn composes_single_and_multiple_labels() {
        assert!(compose_utterance(&labels(&[])).is_none());

        let single = compose_utterance(&labels(&["dog"])).unwrap();
        assert_eq!(single.text, "I see a dog");
        assert!(single.flush);

        let many = compose_utterance(&labels(&["dog", "cat"])).unwrap();
        assert_eq!(many.text, "I see: cat, dog");
        assert_eq!(many.labels, vec!["cat", "dog"]);
    }

    #[test]
    fn channel_sink_delivers_in_order() {
        let (mut sink, rx) = ChannelSpeechSink::new();
        sink.speak(compose_utterance(&labels(&["dog"])).unwrap());
        sink.speak(compose_utterance(&labels(&["cat"])).unwrap());
        let received: Vec<String> = rx.try_iter().map(|u| u.text).collect();
        assert_eq!(received, vec!["I see a dog", "I see a cat"]);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSpeechSink::new();
        drop(rx);
        sink.speak(compose_utterance(&labels(&["dog"])).unwrap());
    }
}
