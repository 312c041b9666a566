//! Sample `Books` resource served by the `test-server` binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use hyperroute_core::{
    Body, CollectionRoutesBuilder, Identifier, ItemRoutesBuilder, Method, RequestContext, Router,
    RouterDescriptor,
};
use parking_lot::RwLock;
use serde::Serialize;

use crate::service::collaborators::Collaborators;

/// Plugin key the demo router registers under.
pub const BOOKS_KEY: &str = "demo/books";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub checked_out: bool,
    pub archived: bool,
    pub due_in_days: Option<u32>,
}

impl Book {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            checked_out: false,
            archived: false,
            due_in_days: None,
        }
    }
}

/// Identifier marker for books; ids are numeric.
pub struct BookId;

impl Identifier for BookId {
    type Id = u64;
}

/// Loan rules handed to handlers by the provider manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    pub loan_days: u32,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self { loan_days: 14 }
    }
}

/// In-memory book store.
#[derive(Debug, Default)]
pub struct Library {
    books: RwLock<BTreeMap<u64, Book>>,
}

impl Library {
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: RwLock::new(books.into_iter().map(|book| (book.id, book)).collect()),
        }
    }

    #[must_use]
    pub fn seeded() -> Self {
        Self::with_books([
            Book::new(1, "Dune"),
            Book::new(2, "Solaris"),
            Book::new(3, "Hyperion"),
        ])
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<Book> {
        self.books.read().get(&id).cloned()
    }

    fn update(&self, id: u64, change: impl FnOnce(&mut Book)) -> anyhow::Result<Book> {
        let mut books = self.books.write();
        let book = books.get_mut(&id).ok_or_else(|| anyhow!("no book with id {id}"))?;
        change(book);
        Ok(book.clone())
    }

    fn checkout_by_title(&self, title: &str, policy: LoanPolicy) -> anyhow::Result<Book> {
        let mut books = self.books.write();
        let book = books
            .values_mut()
            .find(|book| book.title == title && !book.checked_out && !book.archived)
            .ok_or_else(|| anyhow!("no available copy of {title:?}"))?;
        book.checked_out = true;
        book.due_in_days = Some(policy.loan_days);
        Ok(book.clone())
    }
}

/// Router exposing the library's custom operations.
///
/// Collection: `checkout` (POST). Item: `archive` (GET), `renew` (PUT),
/// `return` (DELETE).
#[derive(Debug, Clone)]
pub struct BookRouter {
    library: Arc<Library>,
}

impl BookRouter {
    pub fn new(library: Arc<Library>) -> Self {
        Self { library }
    }
}

impl Default for BookRouter {
    fn default() -> Self {
        Self::new(Arc::new(Library::seeded()))
    }
}

impl Router for BookRouter {
    type Model = Book;
    type Identifier = BookId;

    fn collection_routes(
        &self,
        builder: CollectionRoutesBuilder<Book>,
    ) -> Option<CollectionRoutesBuilder<Book>> {
        let library = Arc::clone(&self.library);
        Some(builder.add_custom_operation_with::<LoanPolicy, _, _>(
            "checkout",
            Method::Post,
            move |body: Body, policy: LoanPolicy| {
                let title = body.string("title").context("body must carry a title")?;
                library.checkout_by_title(title, policy)
            },
        ))
    }

    fn item_routes(
        &self,
        builder: ItemRoutesBuilder<Book, BookId>,
    ) -> Option<ItemRoutesBuilder<Book, BookId>> {
        let archive = Arc::clone(&self.library);
        let renew = Arc::clone(&self.library);
        let give_back = Arc::clone(&self.library);
        Some(
            builder
                .add_custom_operation(
                    "archive",
                    Method::Get,
                    move |_ctx: &RequestContext, id: u64, _body: Body| {
                        archive.update(id, |book| book.archived = true)
                    },
                )
                .add_custom_operation_with::<LoanPolicy, _, _>(
                    "renew",
                    Method::Put,
                    move |id: u64, _body: Body, policy: LoanPolicy| {
                        renew.update(id, |book| {
                            book.due_in_days =
                                Some(book.due_in_days.unwrap_or(0) + policy.loan_days);
                        })
                    },
                )
                .add_custom_operation(
                    "return",
                    Method::Delete,
                    move |_ctx: &RequestContext, id: u64, _body: Body| {
                        give_back.update(id, |book| {
                            book.checked_out = false;
                            book.due_in_days = None;
                        })
                    },
                ),
        )
    }
}

/// Collaborators wired for the `Books` resource: name, numeric id mapper,
/// loan policy provider and JSON representation.
#[must_use]
pub fn collaborators() -> Collaborators {
    let collaborators = Collaborators::new();
    collaborators.names.register::<BookId>("Books");
    collaborators.mappers.register_parsed::<BookId>();
    collaborators.providers.register_value(LoanPolicy::default());
    collaborators.representor.register::<Book>();
    collaborators
}

#[must_use]
pub fn descriptor(library: Arc<Library>) -> RouterDescriptor {
    RouterDescriptor::from_router(BOOKS_KEY, BookRouter::new(library))
}
