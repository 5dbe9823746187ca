use crate::application::transaction::{TransactionCoordinator, TxContext};
use crate::domain::ports::{PasswordHasherRef, TokenIssuerRef, TxManager, UserRepositoryRef};
use crate::domain::{Role, UserId};
use crate::error::{Error, Result};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Registration, login and token issuance.
pub struct IdentityService<M: TxManager> {
    coordinator: TransactionCoordinator<M>,
    users: UserRepositoryRef<M::Tx>,
    hasher: PasswordHasherRef,
    tokens: TokenIssuerRef,
    dummy_roles: Arc<[Role]>,
}

impl<M: TxManager> IdentityService<M> {
    /// Creates a new `IdentityService`.
    ///
    /// # Arguments
    ///
    /// * `dummy_roles` - Roles for which [`dummy_login`](Self::dummy_login)
    ///   issues tokens.
    pub fn new(
        coordinator: TransactionCoordinator<M>,
        users: UserRepositoryRef<M::Tx>,
        hasher: PasswordHasherRef,
        tokens: TokenIssuerRef,
        dummy_roles: Vec<Role>,
    ) -> Self {
        Self {
            coordinator,
            users,
            hasher,
            tokens,
            dummy_roles: dummy_roles.into(),
        }
    }

    /// Creates a user and returns its identifier.
    ///
    /// The password is hashed before the transaction begins; the email check
    /// and the insert share one transaction, with the store's unique email
    /// constraint as backstop.
    pub async fn register(
        &self,
        ctx: &mut TxContext<M::Tx>,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<UserId> {
        let role: Role = role
            .parse()
            .inspect_err(|_| warn!(email, role, "registration with unknown role"))?;
        let password_hash = self
            .hasher
            .hash(password)
            .inspect_err(|err| error!(email, error = %err, "failed to hash password"))?;

        let users = Arc::clone(&self.users);
        let email = email.to_owned();
        let user = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    let existing = users
                        .get_user(tx, &email)
                        .await
                        .map_err(Error::storage("get user"))?;
                    if existing.is_some() {
                        return Err(Error::AlreadyExists);
                    }

                    users
                        .create_user(tx, &email, &password_hash, role)
                        .await
                        .map_err(Error::storage("create user"))
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(role = %role, error = %err, "registration failed"))?;

        info!(email = %user.email, role = %user.role, user_id = %user.id, "user registered");
        Ok(user.id)
    }

    /// Verifies credentials and returns a signed token.
    pub async fn login(
        &self,
        ctx: &mut TxContext<M::Tx>,
        email: &str,
        password: &str,
    ) -> Result<String> {
        let users = Arc::clone(&self.users);
        let hasher = Arc::clone(&self.hasher);
        let tokens = Arc::clone(&self.tokens);
        let lookup = email.to_owned();
        let password = password.to_owned();
        let token = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    let user = users
                        .get_user(tx, &lookup)
                        .await
                        .map_err(Error::storage("get user"))?
                        .ok_or(Error::UserNotFound)?;

                    if !hasher.verify(&user.password_hash, &password) {
                        return Err(Error::InvalidCredentials);
                    }
                    tokens.issue(user.id, user.role)
                }
                .boxed()
            })
            .await
            .inspect_err(|err| warn!(email, error = %err, "login failed"))?;

        info!(email, "login successful");
        Ok(token)
    }

    /// Issues a token for a synthetic user without checking credentials.
    ///
    /// Only roles in the configured allow-list are accepted. Nothing is
    /// persisted.
    pub async fn dummy_login(&self, ctx: &mut TxContext<M::Tx>, role: &str) -> Result<String> {
        let role = role
            .parse::<Role>()
            .ok()
            .filter(|role| self.dummy_roles.contains(role))
            .ok_or_else(|| Error::InvalidRole(role.to_owned()))
            .inspect_err(|err| warn!(error = %err, "dummy login rejected"))?;

        let tokens = Arc::clone(&self.tokens);
        self.coordinator
            .run(ctx, move |_| async move { tokens.issue(Uuid::new_v4(), role) }.boxed())
            .await
            .inspect_err(|err| error!(role = %role, error = %err, "dummy login failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Principal;
    use crate::domain::ports::{PasswordHasher, TokenIssuer};
    use crate::error::ErrorKind;
    use crate::infrastructure::in_memory::InMemoryStore;

    /// Reversible stand-ins so the tests do not pay for Argon2 or JWT.
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, plaintext: &str) -> Result<String> {
            Ok(format!("plain:{plaintext}"))
        }

        fn verify(&self, digest: &str, plaintext: &str) -> bool {
            digest.strip_prefix("plain:") == Some(plaintext)
        }
    }

    struct PlainTokens;

    impl TokenIssuer for PlainTokens {
        fn issue(&self, user_id: UserId, role: Role) -> Result<String> {
            Ok(format!("{user_id}:{role}"))
        }

        fn verify(&self, token: &str) -> Result<Principal> {
            let (user_id, role) = token
                .split_once(':')
                .ok_or_else(|| Error::InvalidToken(token.to_owned()))?;
            Ok(Principal {
                user_id: user_id
                    .parse()
                    .map_err(|_| Error::InvalidToken(token.to_owned()))?,
                role: role.parse()?,
            })
        }
    }

    fn service(dummy_roles: Vec<Role>) -> IdentityService<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        IdentityService::new(
            TransactionCoordinator::new(Arc::clone(&store)),
            store,
            Arc::new(PlainHasher),
            Arc::new(PlainTokens),
            dummy_roles,
        )
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service(Role::ALL.to_vec());
        let mut ctx = TxContext::new();

        let user_id = service
            .register(&mut ctx, "a@x.com", "pw", "employee")
            .await
            .unwrap();
        let token = service.login(&mut ctx, "a@x.com", "pw").await.unwrap();

        let principal = PlainTokens.verify(&token).unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.role, Role::Employee);
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_role() {
        let service = service(Role::ALL.to_vec());
        let mut ctx = TxContext::new();

        let err = service
            .register(&mut ctx, "a@x.com", "pw", "Client")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);

        let err = service.login(&mut ctx, "a@x.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }

    #[tokio::test]
    async fn test_dummy_login_honours_allow_list() {
        let service = service(vec![Role::Moderator]);
        let mut ctx = TxContext::new();

        let token = service.dummy_login(&mut ctx, "moderator").await.unwrap();
        assert_eq!(PlainTokens.verify(&token).unwrap().role, Role::Moderator);

        let err = service.dummy_login(&mut ctx, "employee").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);

        let err = service.dummy_login(&mut ctx, "root").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);
    }
}
