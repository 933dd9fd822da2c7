//! Book catalog and lending endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{multipart::MultipartError, Multipart};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId, BookInput, ListQuery},
    services::{books::ImageSource, images::ImageUpload},
    AppState,
};

use super::AuthenticatedUser;

/// Paginated book listing
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BooksResponse {
    pub message: String,
    pub books: Vec<Book>,
    /// Total number of books in the store
    pub total_items: i64,
}

/// A single book
#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub message: String,
    pub book: Book,
}

/// Plain confirmation
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Multipart form accepted by `/addBook` and `/updateBook/{bookId}`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BookForm {
    /// At least 5 characters after trimming
    title: String,
    /// At least 5 characters after trimming
    description: String,
    /// Available copies, non-negative
    count: i32,
    /// Cover file (PNG or JPEG); on update a text value keeps an existing image URL
    #[schema(value_type = String, format = Binary)]
    image: String,
}

/// Raw multipart fields
#[derive(Debug, Default)]
struct BookFields {
    title: Option<String>,
    description: Option<String>,
    count: Option<String>,
    upload: Option<ImageUpload>,
    image_url: Option<String>,
}

impl BookFields {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut fields = BookFields::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            match (name.as_str(), file_name) {
                ("image", Some(file_name)) => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    if !bytes.is_empty() {
                        fields.upload = Some(ImageUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                ("image", None) => fields.image_url = Some(field.text().await.map_err(bad_multipart)?),
                ("title", _) => fields.title = Some(field.text().await.map_err(bad_multipart)?),
                ("description", _) => {
                    fields.description = Some(field.text().await.map_err(bad_multipart)?)
                }
                ("count", _) => fields.count = Some(field.text().await.map_err(bad_multipart)?),
                _ => {}
            }
        }

        Ok(fields)
    }

    /// Text fields as service input; an unparseable count is left for validation to reject
    fn input(&self) -> BookInput {
        let count = self
            .count
            .as_deref()
            .and_then(|count| count.trim().parse::<i32>().ok());

        BookInput::new(
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            count,
        )
    }
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", e))
}

/// Malformed ids map to the nil id, which no stored book carries
fn parse_book_id(raw: &str) -> BookId {
    Uuid::parse_str(raw).unwrap_or(Uuid::nil())
}

/// List books, paginated
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of books", body = BooksResponse),
        (status = 422, description = "page or perPage below 1", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<BooksResponse>> {
    let (books, total_items) = state.services.books.list(&query).await?;

    Ok(Json(BooksResponse {
        message: "Fetched books successfully!.".to_string(),
        books,
        total_items,
    }))
}

/// Create a book (Admin)
#[utoipa::path(
    post,
    path = "/addBook",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not an Admin", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid fields or no image", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let fields = BookFields::read(multipart).await?;
    let input = fields.input();

    let book = state
        .services
        .books
        .create(&claims, input, fields.upload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Book created successfully!".to_string(),
            book,
        }),
    ))
}

/// Fetch one book
#[utoipa::path(
    get,
    path = "/getOne/{bookId}",
    tag = "books",
    params(("bookId" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.books.get(parse_book_id(&book_id)).await?;

    Ok(Json(BookResponse {
        message: "Book fetched.".to_string(),
        book,
    }))
}

/// Update a book (Admin)
#[utoipa::path(
    put,
    path = "/updateBook/{bookId}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("bookId" = Uuid, Path, description = "Book ID")),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 403, description = "Caller is not an Admin", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid fields or no image", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<BookResponse>> {
    let book_id = parse_book_id(&book_id);
    let fields = BookFields::read(multipart).await?;
    let input = fields.input();

    let book = state
        .services
        .books
        .update(
            &claims,
            book_id,
            input,
            ImageSource {
                upload: fields.upload,
                url: fields.image_url,
            },
        )
        .await?;

    Ok(Json(BookResponse {
        message: "Book updated!".to_string(),
        book,
    }))
}

/// Delete a book (Admin)
#[utoipa::path(
    delete,
    path = "/deleteBook/{bookId}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("bookId" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 403, description = "Caller is not an Admin", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .books
        .delete(&claims, parse_book_id(&book_id))
        .await?;

    Ok(Json(MessageResponse {
        message: "Deleted book.".to_string(),
    }))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrow/{bookId}",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("bookId" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book borrowed", body = BookResponse),
        (status = 404, description = "Book missing, unavailable or already borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<String>,
) -> AppResult<Json<BookResponse>> {
    let book = state
        .services
        .books
        .borrow(&claims, parse_book_id(&book_id))
        .await?;

    Ok(Json(BookResponse {
        message: "Book borrowed.".to_string(),
        book,
    }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return/{bookId}",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("bookId" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = BookResponse),
        (status = 404, description = "Caller does not hold this book", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<String>,
) -> AppResult<Json<BookResponse>> {
    let book = state
        .services
        .books
        .return_book(&claims, parse_book_id(&book_id))
        .await?;

    Ok(Json(BookResponse {
        message: "Book returned.".to_string(),
        book,
    }))
}

