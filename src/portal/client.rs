use crate::config::PortalConfig;
use crate::error::PortalError;
use chrono::{DateTime, Duration, Local, NaiveDate};
use reqwest::Client as HttpClient;

const LOGIN_PATH: &str = "/connexion.aspx";
const EXPORT_PATH: &str = "/espaceperso/mes-consommations.aspx";
const LOGIN_SUBMIT_LABEL: &str = "je me connecte";
// the portal expects and produces French day-first dates
const EXPORT_DATE_FORMAT: &str = "%d/%m/%Y";
// legacy ASP portal; exports are not UTF-8
const EXPORT_FALLBACK_CHARSET: &str = "ISO-8859-1";

/// HTTP client for the Iléo customer portal.
///
/// The portal keeps the session in a cookie set by the login form; login and
/// export download must therefore go through the same client instance.
pub struct Client {
    http_client: HttpClient,
    config: PortalConfig,
}

impl Client {
    pub fn new(config: PortalConfig) -> Result<Self, PortalError> {
        let http_client = HttpClient::builder().cookie_store(true).build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Posts the login form. A bad status is an auth failure; bad credentials
    /// without a bad status are only detectable later, from the export body.
    pub async fn login(&self) -> Result<(), PortalError> {
        let url = format!("{}{}", self.config.base_url, LOGIN_PATH);
        let form = [
            ("email", self.config.email.as_str()),
            ("password", self.config.password.as_str()),
            ("connexion", "1"),
            ("valider", LOGIN_SUBMIT_LABEL),
        ];
        let response = self.http_client.post(&url).form(&form).send().await?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(PortalError::LoginRejected {
                status: status.as_u16(),
            });
        }
        // body content is irrelevant; the session cookie is what matters
        response.text().await?;
        Ok(())
    }

    /// Downloads the consumption export for `[start, end]`, decoded with the
    /// portal's legacy charset. An empty or HTML body means the session was
    /// not accepted and the portal answered with its error page.
    pub async fn download_export(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, PortalError> {
        let url = format!("{}{}", self.config.base_url, EXPORT_PATH);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("ex", "1".to_string()),
                ("dateDebut", start.format(EXPORT_DATE_FORMAT).to_string()),
                ("dateFin", end.format(EXPORT_DATE_FORMAT).to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::ExportRejected {
                status: status.as_u16(),
            });
        }

        let body = response.text_with_charset(EXPORT_FALLBACK_CHARSET).await?;
        if body.trim().is_empty() || looks_like_html(&body) {
            return Err(PortalError::NotAuthenticated);
        }
        Ok(body)
    }

    /// Login followed by export download for the rolling window ending `now`.
    pub async fn fetch_window(
        &self,
        now: DateTime<Local>,
        window_days: i64,
    ) -> Result<String, PortalError> {
        self.login().await?;
        let end = now.date_naive();
        let start = end - Duration::days(window_days);
        self.download_export(start, end).await
    }
}

fn looks_like_html(body: &str) -> bool {
    body.to_lowercase().contains("html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn test_config(url: String) -> PortalConfig {
        PortalConfig {
            base_url: url,
            email: "user@example.org".to_string(),
            password: "secret".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod login {
        use super::*;

        #[tokio::test]
        async fn test_sends_credentials_form() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("POST", "/connexion.aspx")
                .match_body(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("email".into(), "user@example.org".into()),
                    Matcher::UrlEncoded("password".into(), "secret".into()),
                    Matcher::UrlEncoded("connexion".into(), "1".into()),
                    Matcher::UrlEncoded("valider".into(), "je me connecte".into()),
                ]))
                .with_status(200)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            client.login().await.unwrap();
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_rejected_on_server_error() {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("POST", "/connexion.aspx")
                .with_status(500)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let err = client.login().await.unwrap_err();

            assert!(matches!(err, PortalError::LoginRejected { status: 500 }));
            assert!(err.is_auth());
        }
    }

    mod download_export {
        use super::*;

        #[tokio::test]
        async fn test_requests_window_in_french_date_format() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("ex".into(), "1".into()),
                    Matcher::UrlEncoded("dateDebut".into(), "05/12/2023".into()),
                    Matcher::UrlEncoded("dateFin".into(), "02/06/2024".into()),
                ]))
                .with_status(200)
                .with_body(fixtures::TWO_ROW_CSV)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let body = client
                .download_export(date(2023, 12, 5), date(2024, 6, 2))
                .await
                .unwrap();

            assert!(body.contains("01/06/2024"));
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_decodes_legacy_charset() {
            let mut server = mockito::Server::new_async().await;
            // "journali\xE8re" is ISO-8859-1 for journalière
            let mut body = b"Date;Consommation journali\xE8re (L);Etat;Index (m3)\n".to_vec();
            body.extend_from_slice(b"01/06/2024;12,0;0;1000\n");
            let _mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(body)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let decoded = client
                .download_export(date(2024, 1, 1), date(2024, 6, 2))
                .await
                .unwrap();

            assert!(decoded.contains("journalière"));
        }

        #[tokio::test]
        async fn test_fetch_error_on_bad_status() {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::Any)
                .with_status(404)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let err = client
                .download_export(date(2024, 1, 1), date(2024, 6, 2))
                .await
                .unwrap_err();

            assert!(matches!(err, PortalError::ExportRejected { status: 404 }));
            assert!(!err.is_auth());
        }

        #[tokio::test]
        async fn test_auth_error_on_html_body() {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(fixtures::HTML_ERROR_PAGE)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let err = client
                .download_export(date(2024, 1, 1), date(2024, 6, 2))
                .await
                .unwrap_err();

            assert!(matches!(err, PortalError::NotAuthenticated));
            assert!(err.is_auth());
        }

        #[tokio::test]
        async fn test_auth_error_on_empty_body() {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body("  \n")
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let err = client
                .download_export(date(2024, 1, 1), date(2024, 6, 2))
                .await
                .unwrap_err();

            assert!(matches!(err, PortalError::NotAuthenticated));
        }
    }

    mod fetch_window {
        use super::*;

        #[tokio::test]
        async fn test_logs_in_then_downloads() {
            let mut server = mockito::Server::new_async().await;
            let login_mock = server
                .mock("POST", "/connexion.aspx")
                .with_status(200)
                .create_async()
                .await;
            let export_mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("dateDebut".into(), "05/12/2023".into()),
                    Matcher::UrlEncoded("dateFin".into(), "02/06/2024".into()),
                ]))
                .with_status(200)
                .with_body(fixtures::TWO_ROW_CSV)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let now = Local.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap();
            let body = client.fetch_window(now, 180).await.unwrap();

            assert!(body.contains("02/06/2024"));
            login_mock.assert_async().await;
            export_mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_login_failure_skips_download() {
            let mut server = mockito::Server::new_async().await;
            let _login_mock = server
                .mock("POST", "/connexion.aspx")
                .with_status(403)
                .create_async()
                .await;
            let export_mock = server
                .mock("GET", "/espaceperso/mes-consommations.aspx")
                .match_query(Matcher::Any)
                .expect(0)
                .create_async()
                .await;

            let client = Client::new(test_config(server.url())).unwrap();
            let now = Local.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap();
            let err = client.fetch_window(now, 180).await.unwrap_err();

            assert!(matches!(err, PortalError::LoginRejected { status: 403 }));
            export_mock.assert_async().await;
        }
    }
}
