use tokio::sync::watch;

use crate::routes::Route;
use crate::session::{Session, SessionContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

/// Gate in front of session-only views. Holds its own subscription so a
/// logout elsewhere is observed on the next poll instead of the next
/// navigation.
#[derive(Debug)]
pub struct AuthGuard {
    session: watch::Receiver<Option<Session>>,
    redirect_to: Route,
}

impl AuthGuard {
    #[must_use]
    pub fn new(context: &SessionContext) -> Self {
        Self {
            session: context.subscribe(),
            redirect_to: Route::Landing,
        }
    }

    #[must_use]
    pub fn redirect_to(mut self, route: Route) -> Self {
        self.redirect_to = route;
        self
    }

    /// Decision for the current session state; marks it as seen.
    pub fn check(&mut self) -> GuardDecision {
        let has_token = self
            .session
            .borrow_and_update()
            .as_ref()
            .is_some_and(|session| !session.access_token.is_empty());
        if has_token {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect(self.redirect_to.clone())
        }
    }

    /// Fresh decision when the session changed since the last check.
    pub fn poll_change(&mut self) -> Option<GuardDecision> {
        match self.session.has_changed() {
            Ok(true) => Some(self.check()),
            Ok(false) => None,
            Err(_) => Some(GuardDecision::Redirect(self.redirect_to.clone())),
        }
    }

    /// Resolves where a navigation to `route` actually lands.
    pub fn resolve(&mut self, route: Route) -> Route {
        if !route.requires_session() {
            return route;
        }
        match self.check() {
            GuardDecision::Allow => route,
            GuardDecision::Redirect(target) => target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthGuard, GuardDecision};
    use crate::api::testing::sample_user;
    use crate::routes::Route;
    use crate::session::{Session, SessionContext};

    fn sign_in(context: &SessionContext) {
        context
            .store_session(Session {
                access_token: "access".to_string(),
                refresh_token: None,
                user: sample_user(),
            })
            .expect("store should succeed");
    }

    #[test]
    fn missing_token_redirects_to_landing() {
        let context = SessionContext::in_memory();
        let mut guard = AuthGuard::new(&context);

        assert_eq!(guard.check(), GuardDecision::Redirect(Route::Landing));
        assert_eq!(guard.resolve(Route::Home), Route::Landing);
        assert_eq!(guard.resolve(Route::chat("abc123")), Route::Landing);
        assert_eq!(guard.resolve(Route::Signup), Route::Signup);
    }

    #[test]
    fn stored_token_allows_guarded_views() {
        let context = SessionContext::in_memory();
        sign_in(&context);
        let mut guard = AuthGuard::new(&context);

        assert_eq!(guard.check(), GuardDecision::Allow);
        assert_eq!(guard.resolve(Route::chat("abc123")), Route::chat("abc123"));
    }

    #[test]
    fn logout_is_observed_without_navigation() {
        let context = SessionContext::in_memory();
        sign_in(&context);
        let mut guard = AuthGuard::new(&context).redirect_to(Route::Login);
        assert_eq!(guard.check(), GuardDecision::Allow);
        assert_eq!(guard.poll_change(), None);

        context.clear().expect("clear should succeed");
        assert_eq!(
            guard.poll_change(),
            Some(GuardDecision::Redirect(Route::Login))
        );
        assert_eq!(guard.poll_change(), None);
    }
}
