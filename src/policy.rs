//! Compile-time choice of whether an array drops its elements.

mod private {
    pub trait Sealed {}
}

/// Decides whether [`FixedArray`](crate::FixedArray) runs element destructors
/// when it is dropped or finalized.
///
/// This is a sealed trait: [`DropElements`] and [`KeepElements`] are the only
/// implementors.
pub trait DropPolicy: private::Sealed {
    /// `true` if elements are dropped in place on teardown.
    const DROP_ELEMENTS: bool;
}

/// The array owns its elements and drops them on teardown.
#[derive(Debug)]
pub enum DropElements {}

/// The array never drops its elements. Use it for trivially destructible
/// values, or for pointers whose targets are owned elsewhere.
#[derive(Debug)]
pub enum KeepElements {}

impl private::Sealed for DropElements {}
impl private::Sealed for KeepElements {}

impl DropPolicy for DropElements {
    const DROP_ELEMENTS: bool = true;
}

impl DropPolicy for KeepElements {
    const DROP_ELEMENTS: bool = false;
}
