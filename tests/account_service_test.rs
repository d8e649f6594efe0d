//! Account service tests: registration, activation, recovery and profiles.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{test_config, InMemoryStore, TEST_PASSWORD};
use labbook::config::{Config, MAX_IMAGE_SIZE_BYTES};
use labbook::domain::{
    ExperimentNote, ImageUpload, NoteDraft, Password, ProfileChanges, Registration,
};
use labbook::errors::AppError;
use labbook::infra::{
    EmployeeRepository, MemoryMailer, MockEmployeeRepository, MockMediaStorage,
    MockPasswordResetRepository, NoteRepository, PasswordResetRepository, UnitOfWork,
};
use labbook::services::{AccountManager, AccountService, AuthService, Authenticator};

fn registration(email: &str, phone: &str) -> Registration {
    Registration {
        email: email.to_string(),
        phone: phone.to_string(),
        password: "s3cret-pass".to_string(),
        first_name: "Rosalind".to_string(),
        last_name: "Franklin".to_string(),
    }
}

struct Harness {
    store: InMemoryStore,
    mailer: Arc<MemoryMailer>,
    accounts: AccountManager<InMemoryStore>,
}

fn harness_with(config: Config, media: MockMediaStorage) -> Harness {
    let store = InMemoryStore::new();
    let mailer = Arc::new(MemoryMailer::new());
    let accounts = AccountManager::new(
        Arc::new(store.clone()),
        mailer.clone(),
        Arc::new(media),
        config,
    );
    Harness {
        store,
        mailer,
        accounts,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), MockMediaStorage::new())
}

/// Extract the token from the activation link in a mail body.
fn token_from(body: &str) -> String {
    let link = body
        .lines()
        .find(|l| l.contains("/profile/email-confirm/"))
        .expect("activation link in body");
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_register_creates_inactive_account_and_sends_one_mail() {
    let h = harness();

    let employee = h
        .accounts
        .register(registration("Rosalind@Lab.ORG", "+79991234567"))
        .await
        .unwrap();

    assert!(!employee.is_active);
    assert_eq!(employee.email, "Rosalind@lab.org");
    let token = employee.token.clone().unwrap();
    assert_eq!(token.len(), 64);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Confirm your email address");
    assert_eq!(sent[0].to, vec!["Rosalind@lab.org".to_string()]);
    assert!(sent[0]
        .body
        .contains(&format!("http://localhost:3000/profile/email-confirm/{}/", token)));
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_phone() {
    let h = harness();
    h.store.seed_employee("taken@lab.org", "+79990000000");

    let err = h
        .accounts
        .register(registration("taken@LAB.org", "+79991111111"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Integrity { ref field, .. } if field == "email"));

    let err = h
        .accounts
        .register(registration("fresh@lab.org", "+79990000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Integrity { ref field, .. } if field == "phone"));
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_register_reports_every_invalid_field() {
    let h = harness();
    let mut bad = registration("not-an-email", "12345");
    bad.password = "short".to_string();

    match h.accounts.register(bad).await {
        Err(AppError::Validation(errors)) => {
            assert!(errors.contains("email"));
            assert!(errors.contains("phone"));
            assert!(errors.contains("password"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(h.store.employees().is_empty());
}

#[tokio::test]
async fn test_register_rolls_back_when_activation_mail_fails() {
    let h = harness();
    h.mailer.set_failing(true);

    let err = h
        .accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Mail(_)));
    assert!(h.store.employees().is_empty());
}

#[tokio::test]
async fn test_register_keeps_account_when_mail_is_optional() {
    let mut config = test_config();
    config.mail.activation_mail_required = false;
    let h = harness_with(config, MockMediaStorage::new());
    h.mailer.set_failing(true);

    let employee = h
        .accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap();

    assert!(h.store.employee(employee.id).is_some());
}

#[tokio::test]
async fn test_redeem_activates_exactly_once() {
    let h = harness();
    h.accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap();
    let token = token_from(&h.mailer.sent()[0].body);

    let activated = h.accounts.redeem(&token).await.unwrap();
    assert!(activated.is_active);
    assert!(activated.token.is_none());
    assert!(h.store.employee(activated.id).unwrap().token.is_none());

    // welcome mail follows the activation mail
    assert_eq!(h.mailer.sent().len(), 2);

    assert!(matches!(h.accounts.redeem(&token).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_redeem_unknown_or_blank_token_is_not_found() {
    let h = harness();
    assert!(matches!(h.accounts.redeem("deadbeef").await, Err(AppError::NotFound)));
    assert!(matches!(h.accounts.redeem("  ").await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_redeem_survives_welcome_mail_failure() {
    let h = harness();
    h.accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap();
    let token = token_from(&h.mailer.sent()[0].body);

    h.mailer.set_failing(true);
    let activated = h.accounts.redeem(&token).await.unwrap();
    assert!(activated.is_active);
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let h = harness();
    h.accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap();
    let auth = Authenticator::new(Arc::new(h.store.clone()), test_config());

    let inactive = auth
        .login("ada@lab.org".to_string(), "s3cret-pass".to_string())
        .await
        .unwrap_err();
    let wrong = auth
        .login("ada@lab.org".to_string(), "wrong-password".to_string())
        .await
        .unwrap_err();
    assert_eq!(inactive.code(), wrong.code());
    assert!(matches!(inactive, AppError::InvalidCredentials));

    let token = token_from(&h.mailer.sent()[0].body);
    h.accounts.redeem(&token).await.unwrap();
    assert!(auth
        .login("ada@lab.org".to_string(), "s3cret-pass".to_string())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_recover_password_mails_new_password() {
    let h = harness();
    let employee = h.store.seed_employee("ada@lab.org", "+79991234567");

    h.accounts
        .recover_password("ada@lab.org".to_string())
        .await
        .unwrap();

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Password recovery");
    let new_password = sent[0]
        .body
        .lines()
        .find_map(|l| l.strip_prefix("New password: "))
        .unwrap()
        .to_string();
    assert_eq!(new_password.len(), 12);

    let stored = Password::from_hash(h.store.employee(employee.id).unwrap().password_hash);
    assert!(stored.verify(&new_password));
    assert!(!stored.verify(TEST_PASSWORD));
}

#[tokio::test]
async fn test_recover_password_restores_hash_when_mail_fails() {
    let h = harness();
    let employee = h.store.seed_employee("ada@lab.org", "+79991234567");
    h.mailer.set_failing(true);

    let err = h
        .accounts
        .recover_password("ada@lab.org".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Mail(_)));

    let stored = Password::from_hash(h.store.employee(employee.id).unwrap().password_hash);
    assert!(stored.verify(TEST_PASSWORD));
}

#[tokio::test]
async fn test_recover_password_unknown_email_is_field_error() {
    let h = harness();
    match h.accounts.recover_password("ghost@lab.org".to_string()).await {
        Err(AppError::Validation(errors)) => assert!(errors.contains("email")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

/// Extract the token from the reset link in a mail body.
fn reset_token_from(body: &str) -> String {
    body.lines()
        .find_map(|l| l.split_once("/password-change/?token="))
        .map(|(_, token)| token.trim().to_string())
        .expect("reset link in body")
}

async fn mailed_reset_token(h: &Harness, email: &str) -> String {
    h.accounts
        .request_password_reset(email.to_string())
        .await
        .unwrap();
    let sent = h.mailer.sent();
    let mail = sent.last().expect("reset mail");
    assert_eq!(mail.subject, "Password reset");
    assert_eq!(mail.to, vec![email.to_string()]);
    reset_token_from(&mail.body)
}

#[tokio::test]
async fn test_password_reset_replaces_password_once() {
    let h = harness();
    let employee = h.store.seed_employee("ada@lab.org", "+79991234567");
    let token = mailed_reset_token(&h, "ada@lab.org").await;

    h.accounts
        .confirm_password_reset(&token, "brand-new-pass".to_string())
        .await
        .unwrap();

    let stored = Password::from_hash(h.store.employee(employee.id).unwrap().password_hash);
    assert!(stored.verify("brand-new-pass"));
    assert!(!stored.verify(TEST_PASSWORD));

    let auth = Authenticator::new(Arc::new(h.store.clone()), test_config());
    assert!(matches!(
        auth.login("ada@lab.org".to_string(), TEST_PASSWORD.to_string())
            .await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(auth
        .login("ada@lab.org".to_string(), "brand-new-pass".to_string())
        .await
        .is_ok());

    let again = h
        .accounts
        .confirm_password_reset(&token, "another-pass".to_string())
        .await;
    assert!(matches!(again, Err(AppError::NotFound)));
    let stored = Password::from_hash(h.store.employee(employee.id).unwrap().password_hash);
    assert!(stored.verify("brand-new-pass"));
}

#[tokio::test]
async fn test_password_reset_consumes_every_outstanding_link() {
    let h = harness();
    h.store.seed_employee("ada@lab.org", "+79991234567");
    let first = mailed_reset_token(&h, "ada@lab.org").await;
    let second = mailed_reset_token(&h, "ada@lab.org").await;
    assert_ne!(first, second);

    h.accounts
        .confirm_password_reset(&second, "brand-new-pass".to_string())
        .await
        .unwrap();

    assert!(matches!(
        h.accounts
            .confirm_password_reset(&first, "another-pass".to_string())
            .await,
        Err(AppError::NotFound)
    ));
    assert!(h.store.reset_tokens().iter().all(|t| t.used));
}

#[tokio::test]
async fn test_password_reset_unknown_or_blank_token_is_not_found() {
    let h = harness();
    h.store.seed_employee("ada@lab.org", "+79991234567");
    mailed_reset_token(&h, "ada@lab.org").await;

    for token in ["not-a-real-token", "", "   "] {
        let result = h
            .accounts
            .confirm_password_reset(token, "brand-new-pass".to_string())
            .await;
        assert!(matches!(result, Err(AppError::NotFound)), "token {:?}", token);
    }
    assert!(h.store.reset_tokens().iter().all(|t| !t.used));
}

#[tokio::test]
async fn test_password_reset_expired_token_is_not_found() {
    let h = harness();
    let employee = h.store.seed_employee("ada@lab.org", "+79991234567");
    h.store
        .password_resets()
        .issue(
            employee.id,
            "stale-token",
            chrono::Utc::now() - chrono::Duration::minutes(1),
        )
        .await
        .unwrap();

    let result = h
        .accounts
        .confirm_password_reset("stale-token", "brand-new-pass".to_string())
        .await;
    assert!(matches!(result, Err(AppError::NotFound)));

    let stored = Password::from_hash(h.store.employee(employee.id).unwrap().password_hash);
    assert!(stored.verify(TEST_PASSWORD));
}

#[tokio::test]
async fn test_password_reset_short_password_keeps_link_usable() {
    let h = harness();
    h.store.seed_employee("ada@lab.org", "+79991234567");
    let token = mailed_reset_token(&h, "ada@lab.org").await;

    match h
        .accounts
        .confirm_password_reset(&token, "short".to_string())
        .await
    {
        Err(AppError::Validation(errors)) => assert!(errors.contains("password")),
        other => panic!("expected validation error, got {:?}", other),
    }

    h.accounts
        .confirm_password_reset(&token, "long-enough".to_string())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_password_reset_for_unknown_or_inactive_email_sends_nothing() {
    let h = harness();
    h.accounts
        .register(registration("ada@lab.org", "+79991234567"))
        .await
        .unwrap();
    let activation_mails = h.mailer.sent().len();

    for email in ["ghost@lab.org", "ada@lab.org"] {
        h.accounts
            .request_password_reset(email.to_string())
            .await
            .unwrap();
    }
    assert_eq!(h.mailer.sent().len(), activation_mails);
    assert!(h.store.reset_tokens().is_empty());
}

#[tokio::test]
async fn test_password_reset_link_is_revoked_when_mail_fails() {
    let h = harness();
    h.store.seed_employee("ada@lab.org", "+79991234567");
    h.mailer.set_failing(true);

    let err = h
        .accounts
        .request_password_reset("ada@lab.org".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Mail(_)));
    assert!(h.store.reset_tokens().is_empty());
}

#[tokio::test]
async fn test_profile_of_another_employee_is_forbidden() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    let bob = h.store.seed_employee("bob@lab.org", "+79997654321");

    assert!(matches!(
        h.accounts.get_profile(ada.id, bob.id).await,
        Err(AppError::Forbidden)
    ));
    assert_eq!(h.accounts.get_profile(ada.id, ada.id).await.unwrap().id, ada.id);
}

#[tokio::test]
async fn test_update_profile_checks_uniqueness_excluding_self() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    h.store.seed_employee("bob@lab.org", "+79997654321");

    // keeping her own email is fine
    let updated = h
        .accounts
        .update_profile(
            ada.id,
            ada.id,
            ProfileChanges {
                email: Some("ada@lab.org".to_string()),
                first_name: Some("Augusta".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Augusta");

    let err = h
        .accounts
        .update_profile(
            ada.id,
            ada.id,
            ProfileChanges {
                phone: Some("+79997654321".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Integrity { ref field, .. } if field == "phone"));
}

#[tokio::test]
async fn test_attach_avatar_validates_and_stores() {
    let mut media = MockMediaStorage::new();
    media
        .expect_save()
        .withf(|folder, extension, _| folder == "users/photos" && extension == "png")
        .times(1)
        .returning(|_, _, _| Ok("users/photos/avatar.png".to_string()));
    let h = harness_with(test_config(), media);
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");

    let too_big = ImageUpload::new("me.png", vec![0; MAX_IMAGE_SIZE_BYTES as usize + 1]);
    match h.accounts.attach_avatar(ada.id, ada.id, too_big).await {
        Err(AppError::Validation(errors)) => assert!(errors.contains("avatar")),
        other => panic!("expected validation error, got {:?}", other),
    }

    let gif = ImageUpload::new("me.gif", vec![1, 2, 3]);
    assert!(matches!(
        h.accounts.attach_avatar(ada.id, ada.id, gif).await,
        Err(AppError::Validation(_))
    ));

    let employee = h
        .accounts
        .attach_avatar(ada.id, ada.id, ImageUpload::new("me.PNG", vec![1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(employee.avatar.as_deref(), Some("users/photos/avatar.png"));
}

fn seed_note(store: &InMemoryStore, owner: Uuid, code: &str) {
    store.put_note(ExperimentNote::new(
        owner,
        NoteDraft::new(code, "Owned note"),
        chrono::Utc::now(),
    ));
}

#[tokio::test]
async fn test_delete_profile_is_protected_by_notes() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    seed_note(&h.store, ada.id, "P-1");

    let err = h.accounts.delete_profile(ada.id, ada.id, false).await.unwrap_err();
    assert!(matches!(err, AppError::Integrity { .. }));

    // only superusers may force
    assert!(matches!(
        h.accounts.delete_profile(ada.id, ada.id, true).await,
        Err(AppError::Forbidden)
    ));
    assert!(h.store.employee(ada.id).is_some());
}

#[tokio::test]
async fn test_superuser_force_delete_removes_notes() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    let mut root = h.store.seed_employee("root@lab.org", "+79990000000");
    root.is_superuser = true;
    root.is_staff = true;
    h.store.put_employee(root.clone());
    seed_note(&h.store, ada.id, "P-1");
    seed_note(&h.store, ada.id, "P-2");

    h.accounts.delete_profile(root.id, ada.id, true).await.unwrap();

    assert!(h.store.employee(ada.id).is_none());
    assert!(h.store.notes().is_empty());
}

#[tokio::test]
async fn test_delete_own_profile_without_notes() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    let bob = h.store.seed_employee("bob@lab.org", "+79997654321");

    assert!(matches!(
        h.accounts.delete_profile(ada.id, bob.id, false).await,
        Err(AppError::Forbidden)
    ));
    h.accounts.delete_profile(ada.id, ada.id, false).await.unwrap();
    assert!(h.store.employee(ada.id).is_none());
}

#[tokio::test]
async fn test_list_profiles_requires_staff() {
    let h = harness();
    let ada = h.store.seed_employee("ada@lab.org", "+79991234567");
    let mut staff = h.store.seed_employee("staff@lab.org", "+79990000000");
    staff.is_staff = true;
    h.store.put_employee(staff.clone());

    assert!(matches!(
        h.accounts.list_profiles(ada.id).await,
        Err(AppError::Forbidden)
    ));
    assert_eq!(h.accounts.list_profiles(staff.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_superuser_is_active_and_privileged() {
    let h = harness();
    let root = h
        .accounts
        .create_superuser(
            "root@lab.org".to_string(),
            "+79990000000".to_string(),
            "supersecret".to_string(),
        )
        .await
        .unwrap();
    assert!(root.is_active && root.is_staff && root.is_superuser);

    assert!(matches!(
        h.accounts
            .create_superuser(
                "root@lab.org".to_string(),
                "+79991111111".to_string(),
                "supersecret".to_string(),
            )
            .await,
        Err(AppError::Integrity { .. })
    ));
}

/// Unit of work over a mockall repository, for call-level expectations.
struct MockedUnitOfWork {
    employees: Arc<MockEmployeeRepository>,
    resets: Arc<MockPasswordResetRepository>,
}

impl UnitOfWork for MockedUnitOfWork {
    fn employees(&self) -> Arc<dyn EmployeeRepository> {
        self.employees.clone()
    }

    fn notes(&self) -> Arc<dyn NoteRepository> {
        Arc::new(labbook::infra::MockNoteRepository::new())
    }

    fn password_resets(&self) -> Arc<dyn PasswordResetRepository> {
        self.resets.clone()
    }
}

#[tokio::test]
async fn test_redeem_passes_trimmed_token_to_repository() {
    let mut repo = MockEmployeeRepository::new();
    repo.expect_activate_by_token()
        .withf(|token| token == "abc123")
        .times(1)
        .returning(|_| Ok(None));

    let accounts = AccountManager::new(
        Arc::new(MockedUnitOfWork {
            employees: Arc::new(repo),
            resets: Arc::new(MockPasswordResetRepository::new()),
        }),
        Arc::new(MemoryMailer::new()),
        Arc::new(MockMediaStorage::new()),
        test_config(),
    );

    assert!(matches!(accounts.redeem(" abc123 ").await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_password_reset_rejected_password_never_reaches_repository() {
    // no expectations: any call to redeem fails the test
    let resets = MockPasswordResetRepository::new();

    let accounts = AccountManager::new(
        Arc::new(MockedUnitOfWork {
            employees: Arc::new(MockEmployeeRepository::new()),
            resets: Arc::new(resets),
        }),
        Arc::new(MemoryMailer::new()),
        Arc::new(MockMediaStorage::new()),
        test_config(),
    );

    let result = accounts
        .confirm_password_reset("abc123", "short".to_string())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}
