//! Class registrations and the process-wide registration cache.
//!
//! A [`ClassRegistration`] is the routing table of one page type. It is
//! built from the page's [`TypeDescriptor`] by classifying every tagged
//! operation and field into one of six endpoint maps:
//!
//! | Map              | Filled from                                          |
//! |------------------|------------------------------------------------------|
//! | `before`         | `request_before` tags                                |
//! | `after`          | `request_after` tags                                 |
//! | `path`           | `request_path` tags on operations not returning a page |
//! | `api`            | `api_path` tags on operations not returning a page   |
//! | `method_reroute` | `request_path`/`api_path` on page-returning operations |
//! | `field_reroute`  | `request_path` tags on reroute fields                |
//!
//! Registrations are immutable once built and cached forever, keyed by the
//! page's `TypeId`. Building never touches the cache, so a registration for
//! a page that reroutes to itself can be built while the cache entry is
//! being filled.

use std::any::{Any, TypeId, type_name};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace};

use pathway_core::{Endpoint, EndpointMap, Pattern, VerbSet};

use crate::error::RegistrationError;
use crate::introspect::{Ancestor, DeclaredField, DeclaredOperation, RouteTag, TypeDescriptor};
use crate::page::{PageObject, PageRoutes};
use crate::reply::ReplyKind;

/// The routing table of one page type.
pub struct ClassRegistration {
    pub(crate) page_type: TypeId,
    pub(crate) page_name: &'static str,
    pub(crate) operations: Vec<DeclaredOperation>,
    pub(crate) fields: Vec<DeclaredField>,
    pub(crate) ancestors: Vec<Ancestor>,
    pub(crate) before: EndpointMap<usize>,
    pub(crate) after: EndpointMap<usize>,
    pub(crate) path: EndpointMap<usize>,
    pub(crate) api: EndpointMap<usize>,
    pub(crate) field_reroute: EndpointMap<usize>,
    pub(crate) method_reroute: EndpointMap<usize>,
}

impl ClassRegistration {
    /// Builds the registration of `P` without consulting the cache.
    pub fn build<P: PageRoutes>() -> Result<Self, RegistrationError> {
        Self::from_descriptor(TypeDescriptor::<P>::of())
    }

    /// Builds a registration from an already filled descriptor.
    pub fn from_descriptor<P: PageRoutes>(descriptor: TypeDescriptor<P>) -> Result<Self, RegistrationError> {
        let page_name = type_name::<P>();
        let (operations, fields, ancestors) = descriptor.into_parts();

        let mut registration = Self {
            page_type: TypeId::of::<P>(),
            page_name,
            operations: Vec::new(),
            fields: Vec::new(),
            ancestors,
            before: EndpointMap::new(),
            after: EndpointMap::new(),
            path: EndpointMap::new(),
            api: EndpointMap::new(),
            field_reroute: EndpointMap::new(),
            method_reroute: EndpointMap::new(),
        };

        for (index, operation) in operations.iter().enumerate() {
            registration.register_operation(index, operation)?;
        }
        for (index, field) in fields.iter().enumerate() {
            registration.register_field(index, field)?;
        }
        registration.operations = operations;
        registration.fields = fields;

        debug!(
            page = page_name,
            before = registration.before.len(),
            after = registration.after.len(),
            path = registration.path.len(),
            api = registration.api.len(),
            method_reroute = registration.method_reroute.len(),
            field_reroute = registration.field_reroute.len(),
            "Built class registration"
        );
        Ok(registration)
    }

    fn register_operation(&mut self, index: usize, operation: &DeclaredOperation) -> Result<(), RegistrationError> {
        let verbs = operation.verbs();
        let delegates = operation.reply_kind() == ReplyKind::Page;

        for tag in operation.tags() {
            let map = match tag {
                RouteTag::Before(_) => &mut self.before,
                RouteTag::After(_) => &mut self.after,
                RouteTag::Path(pattern) | RouteTag::Api(pattern) if delegates => {
                    check_reroute_pattern(self.page_name, operation.name(), pattern)?;
                    &mut self.method_reroute
                }
                RouteTag::Path(_) => &mut self.path,
                RouteTag::Api(_) => &mut self.api,
                RouteTag::Verbs(_) | RouteTag::Required(_) | RouteTag::Optional(_) => continue,
            };
            let Some(pattern) = tag.pattern() else {
                continue;
            };
            insert(map, self.page_name, operation.name(), pattern, verbs, index)?;
        }
        Ok(())
    }

    fn register_field(&mut self, index: usize, field: &DeclaredField) -> Result<(), RegistrationError> {
        for tag in field.tags() {
            match tag {
                RouteTag::Path(pattern) => {
                    if field.target().is_none() {
                        return Err(RegistrationError::NotAPage {
                            page: self.page_name,
                            member: field.name().to_owned(),
                            found: field.type_name(),
                        });
                    }
                    check_reroute_pattern(self.page_name, field.name(), pattern)?;
                    insert(
                        &mut self.field_reroute,
                        self.page_name,
                        field.name(),
                        pattern,
                        VerbSet::ANY,
                        index,
                    )?;
                }
                RouteTag::Before(_) | RouteTag::After(_) | RouteTag::Api(_) | RouteTag::Verbs(_) => {
                    return Err(RegistrationError::UnsupportedFieldTag {
                        page: self.page_name,
                        member: field.name().to_owned(),
                        tag: tag.label(),
                    });
                }
                RouteTag::Required(_) | RouteTag::Optional(_) => {}
            }
        }
        Ok(())
    }

    pub fn page_name(&self) -> &'static str {
        self.page_name
    }

    pub fn page_type(&self) -> TypeId {
        self.page_type
    }

    pub fn operations(&self) -> &[DeclaredOperation] {
        &self.operations
    }

    pub fn fields(&self) -> &[DeclaredField] {
        &self.fields
    }

    pub fn before_map(&self) -> &EndpointMap<usize> {
        &self.before
    }

    pub fn after_map(&self) -> &EndpointMap<usize> {
        &self.after
    }

    pub fn path_map(&self) -> &EndpointMap<usize> {
        &self.path
    }

    pub fn api_map(&self) -> &EndpointMap<usize> {
        &self.api
    }

    pub fn method_reroute_map(&self) -> &EndpointMap<usize> {
        &self.method_reroute
    }

    pub fn field_reroute_map(&self) -> &EndpointMap<usize> {
        &self.field_reroute
    }

    pub(crate) fn operation(&self, endpoint: &Endpoint<usize>) -> &DeclaredOperation {
        &self.operations[*endpoint.handler()]
    }

    pub(crate) fn field(&self, endpoint: &Endpoint<usize>) -> &DeclaredField {
        &self.fields[*endpoint.handler()]
    }

    /// Resolves the receiver for an operation declared by `declaring`.
    ///
    /// That is the page itself when it is of the declaring type, or the base
    /// part reached through an inherited projection. `None` means the page is
    /// not an instance of the declaring type.
    pub(crate) fn receiver<'p>(
        &self,
        page: &'p mut dyn PageObject,
        declaring: TypeId,
    ) -> Option<&'p mut dyn Any> {
        let own = page.page_type();
        let any = page.as_any_mut();
        if own == declaring {
            Some(any)
        } else {
            self.ancestors
                .iter()
                .find(|ancestor| ancestor.type_id == declaring)
                .and_then(|ancestor| (ancestor.project)(any))
        }
    }
}

impl std::fmt::Debug for ClassRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistration")
            .field("page", &self.page_name)
            .field("operations", &self.operations.len())
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

fn check_reroute_pattern(page: &'static str, member: &str, pattern: &str) -> Result<(), RegistrationError> {
    let parsed = Pattern::parse(pattern).map_err(|source| RegistrationError::Pattern {
        page,
        member: member.to_owned(),
        source,
    })?;
    if parsed.ends_with_wildcard() {
        Ok(())
    } else {
        Err(RegistrationError::RerouteWithoutWildcard {
            page,
            member: member.to_owned(),
            pattern: pattern.to_owned(),
        })
    }
}

fn insert(
    map: &mut EndpointMap<usize>,
    page: &'static str,
    member: &str,
    pattern: &str,
    verbs: VerbSet,
    index: usize,
) -> Result<(), RegistrationError> {
    let replaced = map
        .register_with_verbs(pattern, verbs, index)
        .map_err(|source| RegistrationError::Pattern {
            page,
            member: member.to_owned(),
            source,
        })?;
    if replaced.is_some() {
        debug!(page, member, pattern, "Pattern registered twice, keeping the later operation");
    }
    trace!(page, member, pattern, "Registered pattern");
    Ok(())
}

// =============================================================================
// Process-wide cache
// =============================================================================

static REGISTRATIONS: LazyLock<DashMap<TypeId, Arc<ClassRegistration>>> = LazyLock::new(DashMap::new);

/// Returns the cached registration of `P`, building it on first use.
///
/// Concurrent first requests for the same type are serialized on the cache
/// entry, so each registration is built at most once.
pub fn registration<P: PageRoutes>() -> Result<Arc<ClassRegistration>, RegistrationError> {
    let key = TypeId::of::<P>();
    if let Some(existing) = REGISTRATIONS.get(&key) {
        return Ok(Arc::clone(existing.value()));
    }

    match REGISTRATIONS.entry(key) {
        Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
        Entry::Vacant(entry) => {
            let built = Arc::new(ClassRegistration::build::<P>()?);
            entry.insert(Arc::clone(&built));
            Ok(built)
        }
    }
}

/// Returns true if the registration of `P` is already cached.
pub fn is_registered<P: PageRoutes>() -> bool {
    REGISTRATIONS.contains_key(&TypeId::of::<P>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Page, Reroute};
    use pathway_core::{Verb, split_path};

    #[derive(Default)]
    struct Leaf;

    impl Leaf {
        fn leaf(&self) -> &'static str {
            "leaf"
        }
    }

    impl PageRoutes for Leaf {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.operation("leaf", Self::leaf, vec![RouteTag::Path("leaf".into())]);
        }
    }

    impl Page for Leaf {}

    #[derive(Default)]
    struct Root;

    impl Root {
        fn before(&self) {}
        fn after(&self) {}
        fn index(&self) {}
        fn data(&self) {}
        fn child(&self) -> Option<Leaf> {
            Some(Leaf)
        }
    }

    impl PageRoutes for Root {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.operation("before", Self::before, vec![RouteTag::Before("*".into())]);
            d.operation("after", Self::after, vec![RouteTag::After("*".into())]);
            d.operation(
                "index",
                Self::index,
                vec![
                    RouteTag::Path("index".into()),
                    RouteTag::Verbs(VerbSet::new().with(Verb::Post)),
                ],
            );
            d.operation("data", Self::data, vec![RouteTag::Api("data".into())]);
            d.operation("child", Self::child, vec![RouteTag::Path("child/*".into())]);
            d.field("SUB", Reroute::<Leaf>::new(), vec![RouteTag::Path("sub/*".into())]);
        }
    }

    impl Page for Root {}

    #[test]
    fn test_classification() {
        let reg = ClassRegistration::build::<Root>().unwrap();
        assert_eq!(reg.before_map().len(), 1);
        assert_eq!(reg.after_map().len(), 1);
        assert_eq!(reg.path_map().len(), 1);
        assert_eq!(reg.api_map().len(), 1);
        assert_eq!(reg.method_reroute_map().len(), 1);
        assert_eq!(reg.field_reroute_map().len(), 1);

        let index = reg.path_map().get("index").unwrap();
        assert!(index.verbs().accepts(Verb::Post));
        assert!(!index.verbs().accepts(Verb::Get));
        assert!(reg
            .method_reroute_map()
            .best_match(&split_path("child/x"), None)
            .is_some());
    }

    struct BadReroute;

    impl BadReroute {
        fn child(&self) -> Option<Leaf> {
            None
        }
    }

    impl PageRoutes for BadReroute {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.operation("child", Self::child, vec![RouteTag::Path("child".into())]);
        }
    }

    struct BadField;

    impl PageRoutes for BadField {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.opaque_field::<String>("NAME", vec![RouteTag::Path("name/*".into())]);
        }
    }

    struct BadFieldTag;

    impl PageRoutes for BadFieldTag {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.field("SUB", Reroute::<Leaf>::new(), vec![RouteTag::Api("sub/*".into())]);
        }
    }

    #[test]
    fn test_configuration_defects() {
        assert!(matches!(
            ClassRegistration::build::<BadReroute>(),
            Err(RegistrationError::RerouteWithoutWildcard { .. })
        ));
        assert!(matches!(
            ClassRegistration::build::<BadField>(),
            Err(RegistrationError::NotAPage { member, .. }) if member == "NAME"
        ));
        assert!(matches!(
            ClassRegistration::build::<BadFieldTag>(),
            Err(RegistrationError::UnsupportedFieldTag { tag: "api_path", .. })
        ));
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let first = registration::<Leaf>().unwrap();
        let second = registration::<Leaf>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_registered::<Leaf>());
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        #[derive(Default)]
        struct Raced;
        impl PageRoutes for Raced {
            fn describe(_: &mut TypeDescriptor<Self>) {}
        }

        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| registration::<Raced>().unwrap()))
            .collect();
        let regs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(regs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
