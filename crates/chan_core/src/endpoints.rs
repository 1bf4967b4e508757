use serde::{Deserialize, Serialize};
use url::Url;

use crate::{BoardTarget, ImageBoard, ThreadNumber};

/// Base URLs of the supported backends. Bases must end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub dvach: Url,
    pub fourchan_api: Url,
    pub fourchan_media: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dvach: parse_static("https://2ch.hk/"),
            fourchan_api: parse_static("https://a.4cdn.org/"),
            fourchan_media: parse_static("https://i.4cdn.org/"),
        }
    }
}

fn parse_static(raw: &str) -> Url {
    match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => unreachable!("static endpoint {raw} is invalid: {err}"),
    }
}

impl Endpoints {
    /// All three bases pointing at one server (mirrors, tests).
    pub fn single_host(base: Url) -> Self {
        Self {
            dvach: base.clone(),
            fourchan_api: base.clone(),
            fourchan_media: base,
        }
    }

    pub fn catalog_url(&self, target: &BoardTarget) -> Result<Url, url::ParseError> {
        let base = self.api_base(target.image_board);
        base.join(&format!("{}/catalog.json", target.board))
    }

    pub fn thread_url(
        &self,
        target: &BoardTarget,
        number: ThreadNumber,
    ) -> Result<Url, url::ParseError> {
        let base = self.api_base(target.image_board);
        match target.image_board {
            ImageBoard::Dvach => base.join(&format!("{}/res/{number}.json", target.board)),
            ImageBoard::FourChan => base.join(&format!("{}/thread/{number}.json", target.board)),
        }
    }

    /// 2ch reports media as host-relative paths (`/b/src/1/2.png`).
    pub(crate) fn dvach_media(&self, path: &str) -> Result<Url, url::ParseError> {
        self.dvach.join(path)
    }

    pub(crate) fn fourchan_media(&self, board: &str, file_name: &str) -> Result<Url, url::ParseError> {
        self.fourchan_media.join(&format!("{board}/{file_name}"))
    }

    fn api_base(&self, image_board: ImageBoard) -> &Url {
        match image_board {
            ImageBoard::Dvach => &self.dvach,
            ImageBoard::FourChan => &self.fourchan_api,
        }
    }
}
