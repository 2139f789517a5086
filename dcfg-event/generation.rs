//! Generation counters.
//!
//! Async responses are matched against the generation that was current when
//! their request was dispatched. Anything older is ignored, so no request
//! ever needs to be aborted.

/// A generation captured at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct Generation {
  current: u64,
}

impl Generation {
  pub fn new() -> Self {
    Self::default()
  }

  /// Invalidate every outstanding ticket and return the new current one.
  pub fn advance(&mut self) -> Ticket {
    self.current = self.current.wrapping_add(1);
    Ticket(self.current)
  }

  pub fn current(&self) -> Ticket {
    Ticket(self.current)
  }

  pub fn is_current(&self, ticket: Ticket) -> bool {
    self.current == ticket.0
  }
}

/// Slot that only accepts the value of the latest request.
#[derive(Debug)]
pub struct Latest<T> {
  generation: Generation,
  value:      Option<T>,
}

impl<T> Default for Latest<T> {
  fn default() -> Self {
    Self {
      generation: Generation::new(),
      value:      None,
    }
  }
}

impl<T> Latest<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start a new request, superseding any in flight.
  pub fn begin(&mut self) -> Ticket {
    self.generation.advance()
  }

  pub fn is_current(&self, ticket: Ticket) -> bool {
    self.generation.is_current(ticket)
  }

  /// Store `value` if `ticket` is still the latest request.
  pub fn fulfill(&mut self, ticket: Ticket, value: T) -> bool {
    if !self.generation.is_current(ticket) {
      return false;
    }
    self.value = Some(value);
    true
  }

  pub fn get(&self) -> Option<&T> {
    self.value.as_ref()
  }

  /// Drop the stored value and supersede anything in flight.
  pub fn clear(&mut self) {
    self.generation.advance();
    self.value = None;
  }
}
