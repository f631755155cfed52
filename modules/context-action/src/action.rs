//! Action declarations.

/// Lookup key for an action's handler collection.
pub type ActionName = &'static str;

/// A named unit of intent with a fixed payload type.
///
/// Each action is a zero-sized marker type; the set of marker types an
/// application declares is its payload-type map. Registering or dispatching
/// against an undeclared action does not compile.
///
/// Actions without data use `()` as their payload.
pub trait Action: 'static {
    /// The name handlers are stored under, e.g. `"user/login"`.
    const NAME: ActionName;

    /// The value every handler of this action receives.
    type Payload: Clone + Send + Sync + 'static;
}

/// Declare an action marker type.
///
/// ```
/// use context_action::{define_action, Action};
///
/// #[derive(Debug, Clone)]
/// pub struct LoginPayload {
///     pub email: String,
/// }
///
/// define_action!(pub UserLogin => "user/login", LoginPayload);
/// define_action!(
///     /// Payload-less action.
///     pub UserLogout => "user/logout", ()
/// );
///
/// assert_eq!(UserLogin::NAME, "user/login");
/// ```
#[macro_export]
macro_rules! define_action {
    ($(#[$meta:meta])* $vis:vis $name:ident => $action:literal, $payload:ty) => {
        $(#[$meta])*
        #[allow(dead_code)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $crate::Action for $name {
            const NAME: $crate::ActionName = $action;
            type Payload = $payload;
        }
    };
}
