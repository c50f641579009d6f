use floortalk_core::{ClarificationPrompt, ClarifyError};
use tokio::sync::oneshot;

/// Phases of one clarification round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Result received, awaiting the external selection.
    Pending,
    /// Exactly one option was chosen.
    Selected,
    /// Backend invoked with the resolved value.
    Resolving,
    /// Final translation produced.
    Done,
}

/// Write half of the suspension point. Fires at most once; a second
/// submission is rejected rather than silently ignored.
pub struct SelectionSlot {
    tx: Option<oneshot::Sender<String>>,
    allowed: Vec<String>,
}

impl SelectionSlot {
    /// The resolved values this round may be completed with.
    pub fn options(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_spent(&self) -> bool {
        self.tx.is_none()
    }

    /// Complete the round with one of the offered values.
    pub fn submit(&mut self, value: &str) -> Result<(), ClarifyError> {
        if !self.allowed.iter().any(|v| v == value) {
            return Err(ClarifyError::UnknownOption(value.to_string()));
        }
        let tx = self.tx.take().ok_or(ClarifyError::AlreadySelected)?;
        tx.send(value.to_string())
            .map_err(|_| ClarifyError::Abandoned)
    }
}

/// Read half of the suspension point. There is no in-band timeout: if the
/// slot holder never submits (and never drops the slot), this waits forever.
pub struct SelectionWait {
    rx: oneshot::Receiver<String>,
}

impl SelectionWait {
    pub async fn recv(self) -> Result<String, ClarifyError> {
        self.rx.await.map_err(|_| ClarifyError::Abandoned)
    }
}

/// Open the suspension point for one clarification round.
pub fn open_round(prompt: &ClarificationPrompt) -> (SelectionSlot, SelectionWait) {
    let (tx, rx) = oneshot::channel();
    let slot = SelectionSlot {
        tx: Some(tx),
        allowed: prompt
            .options
            .iter()
            .map(|o| o.resolved_value.clone())
            .collect(),
    };
    (slot, SelectionWait { rx })
}
