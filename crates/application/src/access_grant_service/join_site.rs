use super::*;

/// Outcome of joining a job site from a scanned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSiteResult {
    /// Grant linking the site owner to the grantee.
    pub grant: AccessGrant,
    /// Site the grantee joined.
    pub site_id: String,
}

impl AccessGrantService {
    /// Joins a job site from a scanned payload inside `running_app`.
    ///
    /// A payload minted for another app is refused before its token is
    /// touched. A token whose stored offer disagrees with the payload is
    /// consumed and refused.
    pub async fn join_site(
        &self,
        payload: &str,
        grantee_id: SubjectId,
        running_app: &AppTag,
    ) -> AppResult<JoinSiteResult> {
        let payload = QrPayload::decode(payload)?;
        let scanned_offer = payload.offer();

        let (app, token, site_id) = match payload {
            QrPayload::JoinSite {
                app,
                token,
                site_id,
            } => (app, token, site_id),
            other => {
                return Err(AppError::Validation(format!(
                    "expected a join_site payload, got '{}'",
                    other.action().as_str()
                )));
            }
        };

        if &app != running_app {
            return Err(AppError::ScopeMismatch(format!(
                "payload is for app '{app}', not '{running_app}'"
            )));
        }

        let pending = self.consume_pending(&token).await?;

        if &pending.app_scope != running_app {
            return Err(AppError::ScopeMismatch(format!(
                "access token is scoped to '{}', not '{running_app}'",
                pending.app_scope
            )));
        }

        if pending.offer != scanned_offer {
            return Err(AppError::ScopeMismatch(
                "access token does not offer this site".to_owned(),
            ));
        }

        let grant = self.grant_for(&pending, grantee_id).await?;
        Ok(JoinSiteResult { grant, site_id })
    }
}
