//! Static file serving from a directory tree.
//!
//! Request paths are percent-decoded and normalised lexically before being
//! joined to the root, so `..` can never climb out of it. Directories are
//! served through `index.html`/`index.htm` when present and as an HTML
//! listing otherwise.

use std::borrow::Cow;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::handler::Handler;
use super::server::Response;
use super::{Header, Method, Request};

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        StaticFiles { root: root.into() }
    }

    /// Maps a request target onto the filesystem. The second value records
    /// whether the request path ended in `/`.
    pub fn translate_path(&self, target: &str) -> (PathBuf, bool) {
        let path = target.split('?').next().unwrap_or("");
        let path = path.split('#').next().unwrap_or("");
        let trailing_slash = path.trim_end().ends_with('/');
        let decoded = percent_decode(path);

        let mut words: Vec<&str> = Vec::new();
        for word in decoded.split('/') {
            match word {
                "" | "." => {}
                ".." => {
                    words.pop();
                }
                w => words.push(w),
            }
        }

        let mut result = self.root.clone();
        for word in words {
            result.push(word);
        }
        (result, trailing_slash)
    }

    fn send_head(&self, req: &Request) -> Response {
        let (mut path, trailing_slash) = self.translate_path(req.target());

        if path.is_dir() {
            if !req.path().ends_with('/') {
                return redirect_to_directory(req.target());
            }
            match INDEX_FILES.iter().map(|name| path.join(name)).find(|p| p.is_file()) {
                Some(index) => path = index,
                None => return self.list_directory(&path, req.path()),
            }
        } else if trailing_slash {
            return Response::error(404, "File not found");
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("Unable to open {}: {}", path.to_string_lossy(), e);
                return Response::error(404, "File not found");
            }
        };
        let metadata = match file.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::debug!("Unable to stat {}: {}", path.to_string_lossy(), e);
                return Response::error(404, "File not found");
            }
        };
        let modified = metadata.modified().ok().map(truncate_to_seconds);

        if let (Some(modified), Some(since)) = (modified, if_modified_since(req)) {
            if modified <= since {
                return Response::builder(304).build();
            }
        }

        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        let mut builder = Response::builder(200).content_type(content_type.as_ref());
        if let Some(modified) = modified {
            builder = builder.header(Header::LastModified, httpdate::fmt_http_date(modified));
        }
        builder.send_file(file, metadata.len()).build()
    }

    fn list_directory(&self, dir: &Path, request_path: &str) -> Response {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Unable to list {}: {}", dir.to_string_lossy(), e);
                return Response::error(404, "No permission to list directory");
            }
        };

        let mut names: Vec<(String, String, String)> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            let mut display = name.clone();
            let mut link = urlencoding::encode(&name).into_owned();
            // Follows symlinks, so a link to a directory reads `name/@`.
            if entry.path().is_dir() {
                display.push('/');
                link.push('/');
            }
            if file_type.is_symlink() {
                display.push('@');
            }
            names.push((name.to_lowercase(), display, link));
        }
        names.sort();

        let title = format!("Directory listing for {}", escape_html(&percent_decode(request_path)));
        let mut page = String::new();
        page.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        page.push_str(&format!("<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n<hr>\n<ul>\n", title, title));
        for (_, display, link) in names {
            page.push_str(&format!("<li><a href=\"{}\">{}</a></li>\n", escape_html(&link), escape_html(&display)));
        }
        page.push_str("</ul>\n<hr>\n</body>\n</html>\n");

        Response::builder(200)
            .content_type("text/html; charset=utf-8")
            .body_from_string(&page)
            .build()
    }
}

impl Handler for StaticFiles {
    fn handle(&self, req: &Request) -> Response {
        match req.method() {
            Method::GET | Method::HEAD => self.send_head(req),
            other => {
                log::debug!("Unsupported method for static files: {}", other);
                Response::error(501, &format!("Unsupported method ('{}')", other))
            }
        }
    }
}

fn redirect_to_directory(target: &str) -> Response {
    let split_at = target.find(|c| c == '?' || c == '#').unwrap_or(target.len());
    let (path, rest) = target.split_at(split_at);
    let location = format!("{}/{}", path, rest);

    Response::builder(301)
        .header(Header::Location, location)
        .header(Header::ContentLength, "0")
        .build()
}

fn if_modified_since(req: &Request) -> Option<SystemTime> {
    if req.header(Header::IfNoneMatch).is_some() {
        return None;
    }
    let value = req.header(Header::IfModifiedSince)?;
    httpdate::parse_http_date(value).ok()
}

fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => UNIX_EPOCH + Duration::from_secs(since_epoch.as_secs()),
        Err(_) => time,
    }
}

fn percent_decode(s: &str) -> Cow<'_, str> {
    match urlencoding::decode_binary(s.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(s),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("Setting up temp directory");
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("script.js"), "console.log(1)").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        let mut f = File::create(dir.path().join("assets").join("B & <c>.txt")).unwrap();
        f.write_all(b"text").unwrap();
        fs::create_dir(dir.path().join("assets").join("Alpha")).unwrap();
        dir
    }

    fn get(files: &StaticFiles, target: &str) -> Response {
        files.handle(&Request::new(Method::GET, target))
    }

    fn body(resp: Response) -> String {
        String::from_utf8(resp.into_body_bytes().unwrap()).unwrap()
    }

    #[test]
    fn translate_path_cannot_escape_root() {
        let files = StaticFiles::new("/srv/site");
        assert_eq!(files.translate_path("/../../etc/passwd"), (PathBuf::from("/srv/site/etc/passwd"), false));
        assert_eq!(files.translate_path("/a/./b/../c/?q=1"), (PathBuf::from("/srv/site/a/c"), true));
        assert_eq!(files.translate_path("/%2e%2e/x%20y"), (PathBuf::from("/srv/site/x y"), false));
    }

    #[test]
    fn serves_file_with_guessed_type_and_length() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let resp = get(&files, "/index.html");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get(Header::ContentType), Some("text/html"));
        assert_eq!(resp.headers().get(Header::ContentLength), Some("13"));
        assert!(resp.headers().contains(Header::LastModified));
        assert_eq!(body(resp), "<h1>home</h1>");
    }

    #[test]
    fn root_serves_index() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        assert_eq!(body(get(&files, "/")), "<h1>home</h1>");
    }

    #[test]
    fn missing_file_is_404() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        assert_eq!(get(&files, "/nope.html").status(), 404);
        assert_eq!(get(&files, "/index.html/").status(), 404);
    }

    #[test]
    fn directory_without_slash_redirects_keeping_query() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let resp = get(&files, "/assets?x=1");
        assert_eq!(resp.status(), 301);
        assert_eq!(resp.headers().get(Header::Location), Some("/assets/?x=1"));
    }

    #[test]
    fn directory_without_index_is_listed_sorted_and_escaped() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let resp = get(&files, "/assets/");
        assert_eq!(resp.status(), 200);
        let page = body(resp);
        assert!(page.contains("Directory listing for /assets/"));
        let alpha = page.find("Alpha/").unwrap();
        let b = page.find("B &amp; &lt;c&gt;.txt").unwrap();
        assert!(alpha < b);
        assert!(page.contains("href=\"B%20%26%20%3Cc%3E.txt\""));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_marked_and_followed_for_directories() {
        let dir = site();
        let assets = dir.path().join("assets");
        std::os::unix::fs::symlink(assets.join("Alpha"), assets.join("beta")).unwrap();
        std::os::unix::fs::symlink(assets.join("B & <c>.txt"), assets.join("gamma")).unwrap();

        let page = body(get(&StaticFiles::new(dir.path()), "/assets/"));
        assert!(page.contains("<a href=\"beta/\">beta/@</a>"), "{}", page);
        assert!(page.contains("<a href=\"gamma\">gamma@</a>"), "{}", page);
    }

    #[test]
    fn unmodified_file_is_304() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let later = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(3600));
        let req = Request::new(Method::GET, "/script.js").with_header(Header::IfModifiedSince, later);
        let resp = files.handle(&req);
        assert_eq!(resp.status(), 304);
        assert!(!resp.has_body());

        let req = req.with_header(Header::IfNoneMatch, "\"abc\"");
        assert_eq!(files.handle(&req).status(), 200);
    }

    #[test]
    fn other_methods_are_not_implemented() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let resp = files.handle(&Request::new(Method::POST, "/index.html"));
        assert_eq!(resp.status(), 501);
        assert_eq!(resp.error_message(), Some("Unsupported method ('POST')"));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html("<a href='x'>&\"</a>"), "&lt;a href=&#x27;x&#x27;&gt;&amp;&quot;&lt;/a&gt;");
    }
}
