use std::env;
use tracing::info;

use crate::browser::BrowsingSession;
use crate::config::{Selectors, SiteConfig, Timeouts};
use crate::error::{AuthError, SessionError};

pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, AuthError> {
        let email = env::var("LINKEDIN_EMAIL").map_err(|_| AuthError::MissingCredentials("LINKEDIN_EMAIL"))?;
        let password =
            env::var("LINKEDIN_PASSWORD").map_err(|_| AuthError::MissingCredentials("LINKEDIN_PASSWORD"))?;
        Ok(Self { email, password })
    }
}

/// Signs in and waits until the post-login view renders.
pub fn login<S: BrowsingSession>(
    session: &mut S,
    credentials: &Credentials,
    site: &SiteConfig,
    selectors: &Selectors,
    timeouts: &Timeouts,
) -> Result<(), AuthError> {
    session.navigate(&site.login_url)?;

    let username = session.find(&selectors.login_username, timeouts.login())?;
    session.type_text(&username, &credentials.email)?;

    let password = session.find(&selectors.login_password, timeouts.field())?;
    session.type_text(&password, &credentials.password)?;

    let submit = session.find(&selectors.login_submit, timeouts.field())?;
    session.click(&submit)?;

    match session.find(&selectors.login_landmark, timeouts.login()) {
        Ok(_) => {
            info!("Logged in as {}", credentials.email);
            Ok(())
        }
        Err(SessionError::Timeout { .. }) => Err(AuthError::Rejected(
            "signed-in page never appeared (wrong password or a verification challenge?)".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
