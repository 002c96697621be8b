//! Handler system.
//!
//! Page operations are ordinary methods. [`Handler`] is implemented for any
//! function whose first parameter is the page (`&mut P` or `&P`), whose
//! remaining parameters implement [`FromContext`], and whose return type
//! implements [`Reply`]. Methods are registered by path, e.g.
//! `Self::hello`, so no wrapper types are needed.
//!
//! ```rust,ignore
//! impl Hello {
//!     // receiver only
//!     fn index(&self) -> &'static str { "hello" }
//!
//!     // with bound parameters
//!     fn greet(&mut self, params: Params, out: TextOut) {
//!         out.write(&format!("hi {}", params.get_str("name").unwrap_or_default()));
//!     }
//!
//!     // reroute: returns a delegate page
//!     fn admin(&self) -> Option<AdminPage> { Some(AdminPage::default()) }
//! }
//! ```

use crate::context::RequestContext;
use crate::error::{DispatchError, ExtractError};
use crate::extractor::FromContext;
use crate::reply::{Outcome, Reply, ReplyKind};

/// Result of calling a handler.
///
/// The outer error means a parameter could not be bound and the handler body
/// never ran; the inner result is what the handler produced.
pub type CallResult = Result<Result<Outcome, DispatchError>, ExtractError>;

/// Marker for handlers taking the page by `&mut`.
#[doc(hidden)]
pub struct ByMut;

/// Marker for handlers taking the page by `&`.
#[doc(hidden)]
pub struct ByRef;

/// A page operation callable by the dispatcher.
///
/// `T` only exists to keep the blanket implementations apart and is inferred
/// at the registration site.
pub trait Handler<P, T>: Send + Sync + 'static {
    /// The static kind of the handler's return type.
    fn reply_kind(&self) -> ReplyKind;

    /// Binds parameters from `ctx` and calls the handler on `page`.
    fn call(&self, page: &mut P, ctx: &RequestContext) -> CallResult;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<P, F, R, $($ty,)*> Handler<P, (ByMut, $($ty,)*)> for F
        where
            P: 'static,
            F: Fn(&mut P, $($ty,)*) -> R + Send + Sync + 'static,
            R: Reply,
            $( $ty: FromContext, )*
        {
            fn reply_kind(&self) -> ReplyKind {
                R::KIND
            }

            fn call(&self, page: &mut P, ctx: &RequestContext) -> CallResult {
                $(
                    let $ty = $ty::from_context(ctx)?;
                )*

                Ok((self)(page, $($ty,)*).into_outcome())
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<P, F, R, $($ty,)*> Handler<P, (ByRef, $($ty,)*)> for F
        where
            P: 'static,
            F: Fn(&P, $($ty,)*) -> R + Send + Sync + 'static,
            R: Reply,
            $( $ty: FromContext, )*
        {
            fn reply_kind(&self) -> ReplyKind {
                R::KIND
            }

            fn call(&self, page: &mut P, ctx: &RequestContext) -> CallResult {
                $(
                    let $ty = $ty::from_context(ctx)?;
                )*

                Ok((self)(&*page, $($ty,)*).into_outcome())
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
