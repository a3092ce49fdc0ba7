//! Tokens exchanged between actors.

use std::any::Any;
use std::fmt;

use dyn_clone::DynClone;

/// An opaque, cloneable token payload.
///
/// This trait is implemented for every `Clone + Send + Debug + 'static` type,
/// so it never needs to be implemented manually.
pub trait Payload: DynClone + Any + Send + fmt::Debug {
    /// Upcasts a reference to the payload.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts the boxed payload.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Clone + Send + fmt::Debug> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

dyn_clone::clone_trait_object!(Payload);

/// A token transported by a receiver.
///
/// A [`Token::Null`] carries no data: it only advances the logical time of
/// the receiving actor and is never handed over to actor code by
/// [`Context`](crate::actor::Context) reads.
#[derive(Clone, Debug)]
pub enum Token {
    /// A token carrying a payload.
    Data(Box<dyn Payload>),
    /// The null token.
    Null,
}

impl Token {
    /// Creates a data token.
    pub fn new<T: Payload>(value: T) -> Self {
        Self::Data(Box::new(value))
    }

    /// Returns true if this is a null token.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns a reference to the payload if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            // The payload is dereferenced explicitly so that the call is not
            // resolved to the blanket implementation for `Box<dyn Payload>`.
            Self::Data(payload) => (**payload).as_any().downcast_ref(),
            Self::Null => None,
        }
    }

    /// Extracts the payload if it has type `T`, or gives the token back.
    pub fn into_value<T: Any>(self) -> Result<T, Token> {
        match self {
            Self::Data(payload) if (*payload).as_any().is::<T>() => payload
                .into_any()
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| Token::Null),
            token => Err(token),
        }
    }
}
