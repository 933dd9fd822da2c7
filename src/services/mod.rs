//! Business logic services

pub mod auth;
pub mod books;
pub mod images;

use std::sync::Arc;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub books: books::BooksService,
}

impl Services {
    /// Create all services over the given repository and image store
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        images: Arc<dyn images::ImageStore>,
    ) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            books: books::BooksService::new(repository, images),
        }
    }
}
