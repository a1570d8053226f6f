use heapless::String;

use crate::error::Error;

/// Maximum number of simultaneously registered notifications.
pub const MAX_URC_CALLBACKS: usize = 10;

/// Longest identifier that can be registered, without the leading `+`.
pub const URC_IDENTIFIER_BUFFER_SIZE: usize = 28;

/// What happens when a registered notification has been parsed.
#[derive(Clone, Copy)]
pub enum Handler {
    /// Run a user function with the payload.
    Callback(fn(&[u8])),
    /// Store the payload inside the transport for a blocked waiter.
    Capture,
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callback(a), Self::Callback(b)) => *a as usize == *b as usize,
            (Self::Capture, Self::Capture) => true,
            _ => false,
        }
    }
}

impl core::fmt::Debug for Handler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback"),
            Self::Capture => f.write_str("Capture"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub identifier: String<URC_IDENTIFIER_BUFFER_SIZE>,
    pub handler: Handler,
    /// Remove the notification from the stream seen by the response reader.
    pub discard_payload: bool,
}

/// Fixed size table of notification subscriptions, searched linearly.
#[derive(Debug)]
pub struct UrcRegistry<const N: usize = MAX_URC_CALLBACKS> {
    slots: [Option<Registration>; N],
}

impl<const N: usize> Default for UrcRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> UrcRegistry<N> {
    const EMPTY: Option<Registration> = None;

    pub const fn new() -> Self {
        Self {
            slots: [Self::EMPTY; N],
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `identifier`, replacing any existing registration for it.
    ///
    /// Returns the registration that was replaced, if any.
    pub fn register(
        &mut self,
        identifier: &str,
        handler: Handler,
        discard_payload: bool,
    ) -> Result<Option<Registration>, Error> {
        if identifier.is_empty() {
            return Err(Error::InvalidIdentifier);
        }
        let identifier =
            String::try_from(identifier).map_err(|_| Error::InvalidIdentifier)?;
        let registration = Registration {
            identifier,
            handler,
            discard_payload,
        };

        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(r) if r.identifier == registration.identifier))
        {
            return Ok(slot.replace(registration));
        }

        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(registration);
                Ok(None)
            }
            None => {
                error!(
                    "Max number of URC callbacks reached, cannot register {:?}",
                    registration.identifier.as_str()
                );
                Err(Error::RegistryFull)
            }
        }
    }

    /// Put back a registration previously returned by `register` or `unregister`.
    pub fn restore(&mut self, registration: Registration) -> Result<(), Error> {
        self.register(
            registration.identifier.as_str(),
            registration.handler,
            registration.discard_payload,
        )
        .map(|_| ())
    }

    pub fn unregister(&mut self, identifier: &str) -> Option<Registration> {
        self.slots
            .iter_mut()
            .find(|s| matches!(s, Some(r) if r.identifier.as_str() == identifier))
            .and_then(Option::take)
    }

    /// Exact length and content match on a parsed identifier.
    pub fn find(&self, identifier: &[u8]) -> Option<&Registration> {
        self.slots
            .iter()
            .flatten()
            .find(|r| r.identifier.as_bytes() == identifier)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}
