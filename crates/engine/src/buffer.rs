//! Session-local working copy of a field's selection.

use tablelink_types::{SelectionMode, SelectionValue};
use tracing::debug;

use crate::error::SelectionError;

/// Holds in-progress edits until the picker closes.
///
/// Seeded from the host value when a session opens, replaced on every pick,
/// and committed once. After [`commit`](Self::commit) or
/// [`discard`](Self::discard) the buffer is closed and rejects further use.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedSelection {
    mode: SelectionMode,
    value: SelectionValue,
    open: bool,
}

impl BufferedSelection {
    pub fn seed(initial: SelectionValue, mode: SelectionMode) -> Self {
        Self {
            mode,
            value: initial.normalized(mode),
            open: true,
        }
    }

    /// Replace the working copy with the latest reconciled value.
    pub fn apply(&mut self, reconciled: SelectionValue) -> Result<(), SelectionError> {
        if !self.open {
            return Err(SelectionError::SessionClosed);
        }
        self.value = reconciled.normalized(self.mode);
        debug!(item_count = self.value.len(), "buffered selection updated");
        Ok(())
    }

    pub fn current(&self) -> &SelectionValue {
        &self.value
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Close the buffer and hand back the accumulated value.
    pub fn commit(&mut self) -> Result<SelectionValue, SelectionError> {
        if !self.open {
            return Err(SelectionError::SessionClosed);
        }
        self.open = false;
        Ok(std::mem::take(&mut self.value))
    }

    /// Close the buffer without committing anything.
    pub fn discard(&mut self) {
        if self.open {
            debug!(item_count = self.value.len(), "buffered selection discarded");
        }
        self.open = false;
        self.value = SelectionValue::Empty;
    }
}
