//! First-run staff account

use chatdesk_shared::{Page, Profile, Store, StoreError, User};

use crate::auth::{validate_password, HashProvider, PasswordError, PasswordValidationError};
use crate::config::BootstrapAdmin;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Bootstrap admin password rejected: {0}")]
    WeakPassword(#[from] PasswordValidationError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create a `sudo` user from `admin` when the store holds no staff user yet.
///
/// Returns the created user, or `None` when staff already exist.
pub async fn ensure_admin(
    store: &dyn Store,
    hasher: &dyn HashProvider,
    admin: &BootstrapAdmin,
) -> Result<Option<User>, BootstrapError> {
    let (_, existing) = store.find_users(Page::new(None, Some(1))).await?;
    if existing > 0 {
        tracing::debug!(existing, "Staff users present, skipping bootstrap");
        return Ok(None);
    }

    validate_password(&admin.password)?;
    let password_hash = hasher.generate_hash(&admin.password)?;

    let user = User::new(
        admin.username.trim(),
        admin.email.trim(),
        Profile::Sudo,
        password_hash,
    );
    store.save_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap admin created");
    Ok(Some(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Argon2HashProvider;
    use chatdesk_shared::MemoryStore;

    fn admin(password: &str) -> BootstrapAdmin {
        BootstrapAdmin {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_creates_sudo_user_once() {
        let store = MemoryStore::new();
        let hasher = Argon2HashProvider;

        let created = ensure_admin(&store, &hasher, &admin("correct horse battery"))
            .await
            .unwrap()
            .expect("first run creates the admin");
        assert_eq!(created.profile, Profile::Sudo);
        assert!(hasher
            .compare_hash("correct horse battery", &created.password_hash)
            .unwrap());

        let second = ensure_admin(&store, &hasher, &admin("correct horse battery"))
            .await
            .unwrap();
        assert!(second.is_none());

        let (_, count) = store.find_users(Page::default()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_rejects_short_password() {
        let store = MemoryStore::new();
        let err = ensure_admin(&store, &Argon2HashProvider, &admin("short"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::WeakPassword(_)));

        let (_, count) = store.find_users(Page::default()).await.unwrap();
        assert_eq!(count, 0);
    }
}
