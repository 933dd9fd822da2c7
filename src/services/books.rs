//! Book catalog and lending service

use std::sync::Arc;

use validator::Validate;

use super::images::{ImageStore, ImageUpload};
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookId, BookInput, BorrowOutcome, ListQuery, NewBook, ReturnOutcome, UserClaims,
    },
    repository::Repository,
};

const VALIDATION_FAILED: &str = "Validation failed, entered data is incorrect.";
const BOOK_NOT_FOUND: &str = "Could not find book.";

/// Cover image sent with an update: a new upload wins over an existing URL
#[derive(Debug, Clone, Default)]
pub struct ImageSource {
    pub upload: Option<ImageUpload>,
    pub url: Option<String>,
}

enum PendingImage {
    Upload(ImageUpload),
    Url(String),
}

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    images: Arc<dyn ImageStore>,
}

impl BooksService {
    pub fn new(repository: Repository, images: Arc<dyn ImageStore>) -> Self {
        Self { repository, images }
    }

    /// One page of books and the total number of books
    pub async fn list(&self, query: &ListQuery) -> AppResult<(Vec<Book>, i64)> {
        if query.page() < 1 || query.per_page() < 1 {
            return Err(AppError::Validation(
                "page and perPage must be at least 1".to_string(),
            ));
        }
        self.repository
            .books
            .list(query.offset(), query.per_page())
            .await
    }

    /// Reachability of the book store
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.ping().await
    }

    pub async fn get(&self, id: BookId) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.to_string()))
    }

    pub async fn create(
        &self,
        claims: &UserClaims,
        input: BookInput,
        image: Option<ImageUpload>,
    ) -> AppResult<Book> {
        claims.require_book_management("Not authorized to add book!")?;
        validate(&input)?;

        let upload = image
            .filter(ImageUpload::is_accepted)
            .ok_or_else(|| AppError::MissingAsset("No image provided.".to_string()))?;

        let image_url = self.images.save(&upload).await?;
        let new_book = NewBook {
            title: input.title,
            description: input.description,
            image_url,
            count: input.count.unwrap_or_default(),
        };

        match self.repository.books.create(&new_book).await {
            Ok(book) => {
                tracing::info!(book_id = %book.id, user_id = %claims.user_id, "Book created");
                Ok(book)
            }
            Err(e) => {
                self.discard_image(&new_book.image_url).await;
                Err(e)
            }
        }
    }

    pub async fn update(
        &self,
        claims: &UserClaims,
        id: BookId,
        input: BookInput,
        image: ImageSource,
    ) -> AppResult<Book> {
        claims.require_book_management("Not authorized to update book!")?;
        validate(&input)?;

        let upload = image.upload.filter(ImageUpload::is_accepted);
        let url = image
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let pending = match (upload, url) {
            (Some(upload), _) => PendingImage::Upload(upload),
            (None, Some(url)) => PendingImage::Url(url),
            (None, None) => return Err(AppError::MissingAsset("No file picked.".to_string())),
        };

        let existing = self.get(id).await?;

        let (image_url, uploaded) = match pending {
            PendingImage::Upload(upload) => (self.images.save(&upload).await?, true),
            PendingImage::Url(url) => (url, false),
        };

        let changes = NewBook {
            title: input.title,
            description: input.description,
            image_url,
            count: input.count.unwrap_or_default(),
        };

        let updated = match self.repository.books.update(id, &changes).await {
            Ok(Some(book)) => book,
            result => {
                if uploaded {
                    self.discard_image(&changes.image_url).await;
                }
                return Err(match result {
                    Err(e) => e,
                    _ => AppError::NotFound(BOOK_NOT_FOUND.to_string()),
                });
            }
        };

        if updated.image_url != existing.image_url {
            self.discard_image(&existing.image_url).await;
        }

        tracing::info!(book_id = %id, user_id = %claims.user_id, "Book updated");
        Ok(updated)
    }

    pub async fn delete(&self, claims: &UserClaims, id: BookId) -> AppResult<()> {
        claims.require_book_management("Not authorized to delete book!")?;

        let existing = self.get(id).await?;
        if !self.repository.books.delete(id).await? {
            return Err(AppError::NotFound(BOOK_NOT_FOUND.to_string()));
        }
        self.discard_image(&existing.image_url).await;

        tracing::info!(book_id = %id, user_id = %claims.user_id, "Book deleted");
        Ok(())
    }

    /// Lend one copy of the book to the caller
    pub async fn borrow(&self, claims: &UserClaims, id: BookId) -> AppResult<Book> {
        match self.repository.loans.borrow(id, claims.user_id).await? {
            BorrowOutcome::Borrowed(book) => {
                tracing::info!(book_id = %id, user_id = %claims.user_id, count = book.count, "Book borrowed");
                Ok(book)
            }
            BorrowOutcome::BookMissing => Err(AppError::NotFound(BOOK_NOT_FOUND.to_string())),
            BorrowOutcome::UserMissing => {
                Err(AppError::NotFound("Could not find user.".to_string()))
            }
            BorrowOutcome::Unavailable => Err(AppError::Unavailable(
                "Could not borrow, book unavailable.".to_string(),
            )),
            BorrowOutcome::AlreadyHeld => Err(AppError::AlreadyBorrowed(
                "Could not borrow, already borrowed.".to_string(),
            )),
        }
    }

    /// Take back a book held by the caller
    pub async fn return_book(&self, claims: &UserClaims, id: BookId) -> AppResult<Book> {
        match self.repository.loans.give_back(id, claims.user_id).await? {
            ReturnOutcome::Returned(book) => {
                tracing::info!(book_id = %id, user_id = %claims.user_id, count = book.count, "Book returned");
                Ok(book)
            }
            ReturnOutcome::NotHeld => Err(not_returnable()),
            ReturnOutcome::HeldByOther => {
                tracing::warn!(book_id = %id, user_id = %claims.user_id, "Return refused, book held by another user");
                Err(not_returnable())
            }
        }
    }

    /// Best-effort image deletion; failures are logged, never surfaced
    async fn discard_image(&self, image_url: &str) {
        if let Err(e) = self.images.remove(image_url).await {
            tracing::warn!("Failed to delete image {}: {}", image_url, e);
        }
    }
}

fn validate(input: &BookInput) -> AppResult<()> {
    input
        .validate()
        .map_err(|_| AppError::Validation(VALIDATION_FAILED.to_string()))
}

fn not_returnable() -> AppError {
    AppError::NotReturnable("Could not return, user has no such book.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{NewUser, Role, UserId},
        services::images::MockImageStore,
    };
    use chrono::Utc;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn claims_for(user_id: UserId, role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: format!("{}@mail.com", user_id),
            user_id,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    /// Image store that hands out predictable URLs and accepts any removal
    fn permissive_images() -> MockImageStore {
        let mut images = MockImageStore::new();
        images
            .expect_save()
            .returning(|upload| Ok(format!("images/{}", upload.file_name)));
        images.expect_remove().returning(|_| Ok(()));
        images
    }

    struct Fixture {
        service: BooksService,
        repository: Repository,
        admin: UserClaims,
    }

    async fn fixture(images: MockImageStore) -> Fixture {
        let repository = Repository::in_memory();
        let admin = repository
            .users
            .create(&NewUser {
                name: "Admin".into(),
                email: "admin@mail.com".into(),
                password_hash: "hash".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        Fixture {
            service: BooksService::new(repository.clone(), Arc::new(images)),
            repository,
            admin: claims_for(admin.id, Role::Admin),
        }
    }

    async fn reader(fixture: &Fixture, email: &str) -> UserClaims {
        let user = fixture
            .repository
            .users
            .create(&NewUser {
                name: "Reader".into(),
                email: email.into(),
                password_hash: "hash".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        claims_for(user.id, Role::User)
    }

    async fn add_book(fixture: &Fixture, title: &str, count: i32) -> Book {
        fixture
            .service
            .create(
                &fixture.admin,
                BookInput::new(title, "A fine description", count),
                Some(png("cover.png")),
            )
            .await
            .unwrap()
    }

    async fn holdings(fixture: &Fixture, claims: &UserClaims) -> Vec<BookId> {
        fixture
            .repository
            .users
            .get_by_id(claims.user_id)
            .await
            .unwrap()
            .unwrap()
            .books
    }

    #[tokio::test]
    async fn lending_scenario_between_two_readers() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;
        let b = reader(&f, "b@mail.com").await;
        let book = add_book(&f, "The Left Hand of Darkness", 1).await;

        let borrowed = f.service.borrow(&a, book.id).await.unwrap();
        assert_eq!(borrowed.count, 0);
        assert_eq!(holdings(&f, &a).await, vec![book.id]);

        let err = f.service.borrow(&b, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        let returned = f.service.return_book(&a, book.id).await.unwrap();
        assert_eq!(returned.count, 1);
        assert!(holdings(&f, &a).await.is_empty());

        let borrowed = f.service.borrow(&b, book.id).await.unwrap();
        assert_eq!(borrowed.count, 0);
        assert_eq!(holdings(&f, &b).await, vec![book.id]);
    }

    #[tokio::test]
    async fn held_book_cannot_be_borrowed_twice() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;
        let b = reader(&f, "b@mail.com").await;
        let book = add_book(&f, "Many copies", 5).await;

        assert_ok!(f.service.borrow(&a, book.id).await);

        for caller in [&a, &b] {
            let err = f.service.borrow(caller, book.id).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyBorrowed(_)));
        }
        assert_eq!(f.service.get(book.id).await.unwrap().count, 4);
    }

    #[tokio::test]
    async fn empty_book_is_unavailable_to_everyone() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;
        let book = add_book(&f, "Out of stock", 0).await;

        for caller in [&a, &f.admin] {
            let err = f.service.borrow(caller, book.id).await.unwrap_err();
            assert!(matches!(err, AppError::Unavailable(_)));
        }
    }

    #[tokio::test]
    async fn borrow_unknown_book_is_not_found() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;

        let err = f.service.borrow(&a, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_the_holder_can_return() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;
        let b = reader(&f, "b@mail.com").await;
        let book = add_book(&f, "Contested", 2).await;

        let err = f.service.return_book(&a, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotReturnable(_)));

        f.service.borrow(&a, book.id).await.unwrap();

        let err = f.service.return_book(&b, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotReturnable(_)));
        assert_eq!(f.service.get(book.id).await.unwrap().count, 1);
        assert_eq!(holdings(&f, &a).await, vec![book.id]);
    }

    #[tokio::test]
    async fn count_never_goes_negative_under_concurrent_borrows() {
        let f = fixture(permissive_images()).await;
        let book = add_book(&f, "Hot release", 1).await;

        let mut callers = Vec::new();
        for i in 0..10 {
            callers.push(reader(&f, &format!("r{}@mail.com", i)).await);
        }

        let handles: Vec<_> = callers
            .into_iter()
            .map(|caller| {
                let service = f.service.clone();
                let book_id = book.id;
                tokio::spawn(async move { service.borrow(&caller, book_id).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(f.service.get(book.id).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn readers_cannot_manage_books() {
        let mut images = MockImageStore::new();
        images.expect_save().never();
        images.expect_remove().never();
        let f = fixture(images).await;
        let a = reader(&f, "a@mail.com").await;

        let err = f
            .service
            .create(&a, BookInput::new("Valid title", "Valid description", 1), Some(png("x.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Invalid input still yields Forbidden for a reader
        let err = f
            .service
            .create(&a, BookInput::new("no", "no", -1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let (_, total) = f.service.list(&ListQuery::default()).await.unwrap();
        assert_eq!(total, 0);

        let id = Uuid::new_v4();
        let err = f
            .service
            .update(&a, id, BookInput::new("Valid title", "Valid description", 1), ImageSource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = f.service.delete(&a, id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn readers_cannot_touch_existing_books() {
        let f = fixture(permissive_images()).await;
        let a = reader(&f, "a@mail.com").await;
        let book = add_book(&f, "Protected", 3).await;

        let err = f
            .service
            .update(
                &a,
                book.id,
                BookInput::new("Renamed title", "Valid description", 9),
                ImageSource { upload: None, url: Some(book.image_url.clone()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        assert_err!(f.service.delete(&a, book.id).await);
        assert_eq!(f.service.get(book.id).await.unwrap(), book);
    }

    #[tokio::test]
    async fn short_text_fails_validation_and_stores_nothing() {
        let mut images = MockImageStore::new();
        images.expect_save().never();
        let f = fixture(images).await;

        for (title, description) in [("abcd", "Long enough"), ("Long enough", "    abcd   ")] {
            let err = f
                .service
                .create(&f.admin, BookInput::new(title, description, 1), Some(png("x.png")))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let (_, total) = f.service.list(&ListQuery::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn create_requires_an_accepted_image() {
        let mut images = MockImageStore::new();
        images.expect_save().never();
        let f = fixture(images).await;
        let input = BookInput::new("Valid title", "Valid description", 1);

        let err = f.service.create(&f.admin, input.clone(), None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingAsset(_)));

        let gif = ImageUpload {
            file_name: "x.gif".into(),
            content_type: "image/gif".into(),
            bytes: vec![],
        };
        let err = f.service.create(&f.admin, input, Some(gif)).await.unwrap_err();
        assert!(matches!(err, AppError::MissingAsset(_)));
    }

    #[tokio::test]
    async fn update_with_new_upload_removes_previous_image() {
        let mut images = MockImageStore::new();
        images
            .expect_save()
            .returning(|upload| Ok(format!("images/{}", upload.file_name)));
        images
            .expect_remove()
            .with(eq("images/old.png"))
            .times(1)
            .returning(|_| Err(AppError::Internal("disk unplugged".into())));
        let f = fixture(images).await;

        let book = f
            .service
            .create(&f.admin, BookInput::new("Old title", "Old description", 1), Some(png("old.png")))
            .await
            .unwrap();

        // The failed removal is swallowed
        let updated = f
            .service
            .update(
                &f.admin,
                book.id,
                BookInput::new("  New title  ", "New description", 7),
                ImageSource { upload: Some(png("new.png")), url: Some(book.image_url.clone()) },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.count, 7);
        assert_eq!(updated.image_url, "images/new.png");
    }

    #[tokio::test]
    async fn update_keeping_the_url_leaves_image_alone() {
        let mut images = MockImageStore::new();
        images
            .expect_save()
            .times(1)
            .returning(|upload| Ok(format!("images/{}", upload.file_name)));
        images.expect_remove().never();
        let f = fixture(images).await;
        let book = add_book(&f, "Same cover", 2).await;

        let updated = f
            .service
            .update(
                &f.admin,
                book.id,
                BookInput::new("Same cover", "Another description", 2),
                ImageSource { upload: None, url: Some(book.image_url.clone()) },
            )
            .await
            .unwrap();
        assert_eq!(updated.image_url, book.image_url);
        assert_eq!(updated.description, "Another description");
    }

    #[tokio::test]
    async fn update_failures() {
        let f = fixture(permissive_images()).await;
        let input = BookInput::new("Valid title", "Valid description", 1);

        let err = f
            .service
            .update(&f.admin, Uuid::new_v4(), input.clone(), ImageSource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingAsset(_)));

        let err = f
            .service
            .update(
                &f.admin,
                Uuid::new_v4(),
                input.clone(),
                ImageSource { upload: None, url: Some("images/x.png".into()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let book = add_book(&f, "Existing", 1).await;
        let err = f
            .service
            .update(
                &f.admin,
                book.id,
                BookInput::new("Valid title", "tiny", 1),
                ImageSource { upload: None, url: Some(book.image_url.clone()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_removes_record_and_image() {
        let mut images = MockImageStore::new();
        images
            .expect_save()
            .returning(|upload| Ok(format!("images/{}", upload.file_name)));
        images
            .expect_remove()
            .with(eq("images/doomed.png"))
            .times(1)
            .returning(|_| Ok(()));
        let f = fixture(images).await;
        let a = reader(&f, "a@mail.com").await;

        let book = f
            .service
            .create(&f.admin, BookInput::new("Doomed book", "Soon to vanish", 2), Some(png("doomed.png")))
            .await
            .unwrap();
        f.service.borrow(&a, book.id).await.unwrap();

        f.service.delete(&f.admin, book.id).await.unwrap();

        let err = f.service.get(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(holdings(&f, &a).await.is_empty());

        let err = f.service.delete(&f.admin, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_pages_through_books() {
        let f = fixture(permissive_images()).await;
        for i in 1..=25 {
            add_book(&f, &format!("Book number {}", i), 1).await;
        }

        let query = ListQuery {
            page: Some(2),
            per_page: Some(10),
        };
        let (books, total) = f.service.list(&query).await.unwrap();
        assert_eq!(total, 25);
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        let expected: Vec<_> = (11..=20).map(|i| format!("Book number {}", i)).collect();
        assert_eq!(titles, expected);

        let (books, _) = f.service.list(&ListQuery::default()).await.unwrap();
        assert_eq!(books.len(), 20);

        let err = f
            .service
            .list(&ListQuery {
                page: Some(0),
                per_page: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
