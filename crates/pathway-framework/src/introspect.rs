//! Type descriptors: the declared surface of a page type.
//!
//! A [`TypeDescriptor`] lists a page's operations and fields together with
//! the routing tags attached to each. It is filled by
//! [`PageRoutes::describe`], normally generated by `#[page_routes]`, and is
//! consumed once when the page's class registration is built.
//!
//! Operations keep their *declaring* type. Operations imported from a base
//! type with [`TypeDescriptor::inherit`] are still declared by the base and
//! run against the base part of the page, reached through a projection.

use std::any::{Any, TypeId, type_name};
use std::borrow::BorrowMut;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use pathway_core::VerbSet;

use crate::context::RequestContext;
use crate::handler::{CallResult, Handler};
use crate::page::{Page, PageRoutes, PageTarget, Reroute};
use crate::reply::ReplyKind;

/// Routing metadata attached to an operation or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTag {
    /// Before-interceptor pattern.
    Before(String),
    /// After-interceptor pattern.
    After(String),
    /// Simple path pattern, or a reroute pattern for page-returning operations and fields.
    Path(String),
    /// API path pattern.
    Api(String),
    /// Accepted verbs.
    Verbs(VerbSet),
    /// Parameters an API operation requires.
    Required(Vec<String>),
    /// Parameters an API operation accepts.
    Optional(Vec<String>),
}

impl RouteTag {
    /// The pattern carried by this tag, if it is a routing tag.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::Before(p) | Self::After(p) | Self::Path(p) | Self::Api(p) => Some(p),
            Self::Verbs(_) | Self::Required(_) | Self::Optional(_) => None,
        }
    }

    /// Attribute name of the tag.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Before(_) => "request_before",
            Self::After(_) => "request_after",
            Self::Path(_) => "request_path",
            Self::Api(_) => "api_path",
            Self::Verbs(_) => "request_type",
            Self::Required(_) => "required_variables",
            Self::Optional(_) => "optional_variables",
        }
    }
}

type ErasedCall = Arc<dyn Fn(&mut dyn Any, &RequestContext) -> Option<CallResult> + Send + Sync>;

/// Maps a page to one of its base parts.
pub(crate) type Projector =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

fn projector<F>(f: F) -> Projector
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A declared operation.
#[derive(Clone)]
pub struct DeclaredOperation {
    name: &'static str,
    declaring: TypeId,
    declaring_name: &'static str,
    reply: ReplyKind,
    tags: Vec<RouteTag>,
    call: ErasedCall,
}

impl DeclaredOperation {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaring_type(&self) -> TypeId {
        self.declaring
    }

    pub fn declaring_name(&self) -> &'static str {
        self.declaring_name
    }

    pub fn reply_kind(&self) -> ReplyKind {
        self.reply
    }

    pub fn tags(&self) -> &[RouteTag] {
        &self.tags
    }

    /// Union of all verb tags; empty when the operation accepts every verb.
    pub fn verbs(&self) -> VerbSet {
        self.tags
            .iter()
            .filter_map(|tag| match tag {
                RouteTag::Verbs(verbs) => Some(verbs.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn required(&self) -> Vec<String> {
        self.list_tag(|tag| match tag {
            RouteTag::Required(names) => Some(names),
            _ => None,
        })
    }

    pub fn optional(&self) -> Vec<String> {
        self.list_tag(|tag| match tag {
            RouteTag::Optional(names) => Some(names),
            _ => None,
        })
    }

    fn list_tag(&self, pick: impl Fn(&RouteTag) -> Option<&Vec<String>>) -> Vec<String> {
        self.tags.iter().filter_map(pick).flatten().cloned().collect()
    }

    /// Calls the operation on its declaring-type receiver.
    ///
    /// Returns `None` if `receiver` is not of the declaring type.
    pub(crate) fn call(&self, receiver: &mut dyn Any, ctx: &RequestContext) -> Option<CallResult> {
        (self.call)(receiver, ctx)
    }
}

impl fmt::Debug for DeclaredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredOperation")
            .field("name", &self.name)
            .field("declaring", &self.declaring_name)
            .field("reply", &self.reply)
            .field("tags", &self.tags)
            .finish()
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct DeclaredField {
    name: &'static str,
    declaring_name: &'static str,
    type_name: &'static str,
    target: Option<PageTarget>,
    tags: Vec<RouteTag>,
}

impl DeclaredField {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaring_name(&self) -> &'static str {
        self.declaring_name
    }

    /// Name of the field's declared type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The delegate page, or `None` if the field's type is not a page.
    pub fn target(&self) -> Option<&PageTarget> {
        self.target.as_ref()
    }

    pub fn tags(&self) -> &[RouteTag] {
        &self.tags
    }
}

/// A base type folded into a page through [`TypeDescriptor::inherit`].
#[derive(Clone)]
pub(crate) struct Ancestor {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) project: Projector,
}

/// The declared surface of page type `P`.
pub struct TypeDescriptor<P> {
    operations: Vec<DeclaredOperation>,
    fields: Vec<DeclaredField>,
    ancestors: Vec<Ancestor>,
    _page: PhantomData<fn() -> P>,
}

impl<P: PageRoutes> TypeDescriptor<P> {
    /// Describes `P` by running its [`PageRoutes::describe`].
    pub fn of() -> Self {
        let mut descriptor = Self {
            operations: Vec::new(),
            fields: Vec::new(),
            ancestors: Vec::new(),
            _page: PhantomData,
        };
        P::describe(&mut descriptor);
        descriptor
    }

    pub fn name(&self) -> &'static str {
        type_name::<P>()
    }

    pub fn operations(&self) -> &[DeclaredOperation] {
        &self.operations
    }

    pub fn fields(&self) -> &[DeclaredField] {
        &self.fields
    }

    /// Names of base types folded in with [`inherit`](Self::inherit).
    pub fn ancestors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ancestors.iter().map(|ancestor| ancestor.name)
    }

    /// All tags attached to the operation or field called `member`.
    pub fn tags_of(&self, member: &str) -> Vec<&RouteTag> {
        let ops = self
            .operations
            .iter()
            .filter(|op| op.name == member)
            .flat_map(|op| op.tags.iter());
        let fields = self
            .fields
            .iter()
            .filter(|field| field.name == member)
            .flat_map(|field| field.tags.iter());
        ops.chain(fields).collect()
    }

    /// Declares an operation.
    pub fn operation<H, T>(&mut self, name: &'static str, handler: H, tags: Vec<RouteTag>) -> &mut Self
    where
        H: Handler<P, T>,
    {
        let reply = handler.reply_kind();
        let call: ErasedCall = Arc::new(move |receiver: &mut dyn Any, ctx: &RequestContext| {
            receiver
                .downcast_mut::<P>()
                .map(|page| handler.call(page, ctx))
        });

        self.operations.push(DeclaredOperation {
            name,
            declaring: TypeId::of::<P>(),
            declaring_name: type_name::<P>(),
            reply,
            tags,
            call,
        });
        self
    }

    /// Declares a field that reroutes to page `Q`.
    pub fn field<Q: Page + Default>(
        &mut self,
        name: &'static str,
        _reroute: Reroute<Q>,
        tags: Vec<RouteTag>,
    ) -> &mut Self {
        self.fields.push(DeclaredField {
            name,
            declaring_name: type_name::<P>(),
            type_name: type_name::<Q>(),
            target: Some(PageTarget::of::<Q>()),
            tags,
        });
        self
    }

    /// Declares a tagged field whose type `T` is not a page.
    ///
    /// Building a registration from such a descriptor fails.
    pub fn opaque_field<T: ?Sized>(&mut self, name: &'static str, tags: Vec<RouteTag>) -> &mut Self {
        self.fields.push(DeclaredField {
            name,
            declaring_name: type_name::<P>(),
            type_name: type_name::<T>(),
            target: None,
            tags,
        });
        self
    }

    /// Folds in the operations and fields of base type `B`.
    ///
    /// `B`'s operations stay declared by `B` and run against the `B` part of
    /// the page. Declarations made after this call override `B`'s patterns.
    pub fn inherit<B>(&mut self) -> &mut Self
    where
        B: PageRoutes,
        P: BorrowMut<B>,
    {
        let base = TypeDescriptor::<B>::of();
        let lift = projector(|page: &mut dyn Any| {
            page.downcast_mut::<P>()
                .map(|page| <P as BorrowMut<B>>::borrow_mut(page) as &mut dyn Any)
        });

        self.operations.extend(base.operations);
        self.fields.extend(base.fields);

        for ancestor in base.ancestors {
            let outer = Arc::clone(&lift);
            let inner = ancestor.project;
            self.ancestors.push(Ancestor {
                type_id: ancestor.type_id,
                name: ancestor.name,
                project: projector(move |page: &mut dyn Any| outer(page).and_then(|base| inner(base))),
            });
        }
        self.ancestors.push(Ancestor {
            type_id: TypeId::of::<B>(),
            name: type_name::<B>(),
            project: lift,
        });
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<DeclaredOperation>, Vec<DeclaredField>, Vec<Ancestor>) {
        (self.operations, self.fields, self.ancestors)
    }
}
