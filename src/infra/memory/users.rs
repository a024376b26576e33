use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo};
use crate::domain::entities::UserRecord;

use super::{MemoryRepositories, Tables, paginate, require_text};

fn check_unique(
    tables: &Tables,
    id: Uuid,
    username: &str,
    email: &str,
) -> Result<(), RepoError> {
    for user in tables.users.values().filter(|user| user.id != id) {
        if user.username == username {
            return Err(RepoError::duplicate("users_username_key"));
        }
        if user.email.eq_ignore_ascii_case(email) {
            return Err(RepoError::duplicate("users_email_key"));
        }
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), RepoError> {
    if !email.contains('@') {
        return Err(RepoError::invalid_input("email must contain `@`"));
    }
    Ok(())
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        require_text("username", &params.username)?;
        check_email(&params.email)?;

        self.write("create_user", |tables| {
            let id = Uuid::new_v4();
            check_unique(tables, id, &params.username, &params.email)?;

            let now = tables.tick();
            let user = UserRecord {
                id,
                username: params.username,
                email: params.email,
                display_name: params.display_name,
                created_at: now,
                updated_at: now,
            };
            tables.users.insert(id, user.clone());
            Ok(user)
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.read("find_user_by_id", |tables| tables.users.get(&id).cloned()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.read("find_user_by_username", |tables| {
            tables
                .users
                .values()
                .find(|user| user.username == username)
                .cloned()
        }))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.read("find_user_by_email", |tables| {
            tables
                .users
                .values()
                .find(|user| user.email == email)
                .cloned()
        }))
    }

    async fn list_users(&self, page: PageQuery) -> Result<PaginatedResult<UserRecord>, RepoError> {
        self.read("list_users", |tables| {
            paginate(tables.users.values().cloned(), page, |user| {
                (user.created_at, user.id)
            })
        })
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        if let Some(username) = params.username.as_deref() {
            require_text("username", username)?;
        }
        if let Some(email) = params.email.as_deref() {
            check_email(email)?;
        }

        self.write("update_user", |tables| {
            let current = tables.users.get(&params.id).ok_or(RepoError::NotFound)?;
            let mut updated = current.clone();
            if let Some(username) = params.username {
                updated.username = username;
            }
            if let Some(email) = params.email {
                updated.email = email;
            }
            if let Some(display_name) = params.display_name {
                updated.display_name = display_name;
            }
            check_unique(tables, updated.id, &updated.username, &updated.email)?;

            updated.updated_at = tables.tick();
            tables.users.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.write("delete_user", |tables| {
            if !tables.users.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            let owns_content = tables.questions.values().any(|q| q.author_id == id)
                || tables.answers.values().any(|a| a.author_id == id)
                || tables.comments.values().any(|c| c.author_id == id)
                || tables.attachments.values().any(|a| a.uploader_id == id);
            if owns_content {
                return Err(RepoError::integrity(format!("user {id} still owns content")));
            }
            tables.users.remove(&id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(username: &str, email: &str) -> CreateUserParams {
        CreateUserParams {
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_uppercase(),
        }
    }

    #[tokio::test]
    async fn usernames_and_emails_are_unique() {
        let repo = MemoryRepositories::new();
        repo.create_user(params("ada", "ada@example.com"))
            .await
            .expect("create");

        let err = repo
            .create_user(params("ada", "other@example.com"))
            .await
            .expect_err("duplicate username");
        assert!(matches!(err, RepoError::Duplicate { ref constraint } if constraint == "users_username_key"));

        let err = repo
            .create_user(params("grace", "ADA@example.com"))
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_missing_user_is_not_found() {
        let repo = MemoryRepositories::new();
        let update = UpdateUserParams {
            id: Uuid::new_v4(),
            display_name: Some("Nobody".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_user(update).await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            repo.delete_user(Uuid::new_v4()).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_bumps_updated_at() {
        let repo = MemoryRepositories::new();
        let user = repo
            .create_user(params("ada", "ada@example.com"))
            .await
            .expect("create");
        let renamed = repo
            .update_user(UpdateUserParams {
                id: user.id,
                username: Some("countess".to_string()),
                ..Default::default()
            })
            .await
            .expect("update");

        assert_eq!(renamed.username, "countess");
        assert!(renamed.updated_at > user.updated_at);
        assert_eq!(renamed.created_at, user.created_at);
        assert!(
            repo.find_by_username("ada")
                .await
                .expect("lookup")
                .is_none()
        );
    }
}
