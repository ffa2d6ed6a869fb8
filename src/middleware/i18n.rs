// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::I18nStore;

// Idioma preferido do usuário (só o código primário: "pt", "en")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    // "pt-BR" -> "pt"
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or(tag);
        Locale(primary.to_ascii_lowercase())
    }

    /// O `locale` do corpo da requisição tem precedência sobre o cabeçalho.
    pub fn with_override(self, tag: Option<&str>) -> Self {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Locale::from_tag(t),
            None => self,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale(I18nStore::DEFAULT_LANGUAGE.to_string())
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first() // Pega o primeiro idioma (ex: "pt-BR")
                    .map(|tag| Locale::from_tag(tag))
            })
            .unwrap_or_default();

        Ok(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_locale_overrides_header() {
        let header = Locale::from_tag("en-US");
        assert_eq!(header.clone().with_override(Some("pt-BR")), Locale("pt".into()));
        assert_eq!(header.clone().with_override(Some("  ")), header);
        assert_eq!(header.clone().with_override(None), Locale("en".into()));
    }
}
