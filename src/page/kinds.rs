//! Typed page handles
//!
//! Cached pages are shared as `Arc<RwLock<Page>>`. The wrappers below tie a
//! shared page to the kind it was validated against when it was loaded or
//! created, so `PageService::get_page::<IndexPage>` cannot hand back a data page.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Page, PageId, PageKind};

/// Shared, lockable page
pub type PageRef = Arc<RwLock<Page>>;

/// A shared page known to be of `KIND`
pub trait TypedPage: Sized + Clone {
    const KIND: PageKind;

    /// Wrap a page whose kind has already been checked
    fn from_ref(page: PageRef) -> Self;

    fn page_ref(&self) -> &PageRef;

    fn id(&self) -> PageId {
        self.page_ref().read().id()
    }

    fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.page_ref().read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.page_ref().write()
    }
}

macro_rules! typed_page {
    ($(#[$doc:meta])* $name:ident => $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(PageRef);

        impl TypedPage for $name {
            const KIND: PageKind = $kind;

            fn from_ref(page: PageRef) -> Self {
                Self(page)
            }

            fn page_ref(&self) -> &PageRef {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.0.try_read() {
                    Some(page) => f.debug_tuple(stringify!($name)).field(&*page).finish(),
                    None => f.debug_tuple(stringify!($name)).field(&"<locked>").finish(),
                }
            }
        }
    };
}

typed_page!(
    /// Page holding record blocks
    DataPage => PageKind::Data
);

typed_page!(
    /// Page holding index entries (heap keys or skip-list nodes)
    IndexPage => PageKind::Index
);

typed_page!(
    /// Page holding table metadata for the table facade
    TablePage => PageKind::Table
);

typed_page!(
    /// Page holding spill-over bytes
    OverflowPage => PageKind::Overflow
);
