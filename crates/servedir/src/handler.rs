//! Maps one request to one response off the serving root.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tiny_http::{Header, Method, Request, Response};

use crate::Error;

/// Escapes everything in an `href` except unreserved characters and `/`
const HREF_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Checked in order when a directory is requested
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

pub(crate) fn static_file_handler(source: &Path, req: Request) -> Result<(), Error> {
    if !matches!(req.method(), Method::Get | Method::Head) {
        let response =
            Response::from_string("<h1> <center> 405: Method not allowed </center> </h1>")
                .with_status_code(405)
                .with_header(html_content_type())
                .with_header(Header::from_str("Allow: GET, HEAD").expect("formatted correctly"));
        return respond(req, 405, response);
    }

    // grab the requested path
    let mut req_path = req.url().to_string();

    // a leading `//` run would echo into `Location` as a scheme-relative
    // URL naming another host
    if req_path.starts_with("//") {
        req_path = format!("/{}", req_path.trim_start_matches('/'));
    }

    // split off any querystring so the filesystem lookup doesn't see it
    // (querystrings often used for cachebusting); redirects carry it along
    let query = match req_path.find('?') {
        Some(position) => req_path.split_off(position),
        None => String::new(),
    };

    // `%`-escapes come off before the path touches the filesystem
    let decoded = match percent_decode_str(&req_path).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            let response = Response::from_string("<h1> <center> 400: Bad request </center> </h1>")
                .with_status_code(400)
                .with_header(html_content_type());
            return respond(req, 400, response);
        }
    };

    let Some(path) = rerooted_path(source, &decoded) else {
        // the request tried to climb above the serving root
        return respond(req, 404, not_found());
    };

    if path.is_dir() {
        if !req_path.ends_with('/') {
            // relative links in a listing only resolve under the `/` form
            let location = Header::from_str(&format!("Location: {req_path}/{query}"))
                .expect("formatted correctly");
            return respond(req, 301, Response::empty(301).with_header(location));
        }

        for index in INDEX_FILES {
            let index_path = path.join(index);
            if index_path.is_file() {
                return serve_file(req, &index_path);
            }
        }

        return serve_listing(req, &decoded, &path);
    }

    if decoded.ends_with('/') {
        // a trailing slash promises a directory; don't let it name a file
        return respond(req, 404, not_found());
    }

    serve_file(req, &path)
}

fn serve_file(req: Request, path: &Path) -> Result<(), Error> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            // gone or unreadable; either way the client only learns "not here"
            log::debug!("failed to open {}: {e}", path.display());
            return respond(req, 404, not_found());
        }
    };

    let mime = mime_guess::MimeGuess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream");
    let content_type =
        Header::from_str(&format!("Content-Type: {mime}")).expect("formatted correctly");
    let response = Response::from_file(file).with_header(content_type);
    respond(req, 200, response)
}

fn serve_listing(req: Request, url_path: &str, dir: &Path) -> Result<(), Error> {
    let page = match listing_page(url_path, dir) {
        Ok(page) => page,
        Err(e) => {
            log::debug!("failed to list {}: {e}", dir.display());
            return respond(req, 404, not_found());
        }
    };
    respond(req, 200, Response::from_string(page).with_header(html_content_type()))
}

fn listing_page(url_path: &str, dir: &Path) -> std::io::Result<String> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort_by_key(|name| name.to_lowercase());

    let title = format!("Directory listing for {}", html_escape(url_path));
    let mut page = String::new();
    page.push_str("<!DOCTYPE HTML>\n");
    page.push_str("<html lang=\"en\">\n");
    page.push_str("<head>\n");
    page.push_str("<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{title}</title>\n"));
    page.push_str("</head>\n");
    page.push_str("<body>\n");
    page.push_str(&format!("<h1>{title}</h1>\n"));
    page.push_str("<hr>\n");
    page.push_str("<ul>\n");
    for name in &names {
        page.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            utf8_percent_encode(name, HREF_ENCODE),
            html_escape(name)
        ));
    }
    page.push_str("</ul>\n");
    page.push_str("<hr>\n");
    page.push_str("</body>\n");
    page.push_str("</html>\n");
    Ok(page)
}

/// Join a decoded request path onto the serving root, lexically
///
/// `..` pops, `.` and empty segments vanish, and popping above the root
/// refuses.  Symlinks are resolved by the filesystem, not here.
fn rerooted_path(root: &Path, decoded: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut depth = 0usize;
    for part in decoded.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                depth = depth.checked_sub(1)?;
                path.pop();
            }
            part => {
                // separators smuggled inside one segment (`a\b`, or `C:` on
                // Windows) must not re-root the join
                if part.contains('\\') || part.contains('\0') {
                    return None;
                }
                if cfg!(windows) && part.contains(':') {
                    return None;
                }
                path.push(part);
                depth += 1;
            }
        }
    }
    Some(path)
}

fn html_escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&#39;"),
            '"' => result.push_str("&quot;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

fn html_content_type() -> Header {
    Header::from_str("Content-Type: text/html; charset=utf-8").expect("formatted correctly")
}

fn not_found() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string("<h1> <center> 404: File not found </center> </h1>")
        .with_status_code(404)
        .with_header(html_content_type())
}

fn respond<R>(req: Request, status: u16, response: Response<R>) -> Result<(), Error>
where
    R: std::io::Read,
{
    log::info!("{} {} {}", req.method(), req.url(), status);
    req.respond(response).map_err(Error::new)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reroot_plain() {
        let root = Path::new("/srv/site");
        assert_eq!(
            rerooted_path(root, "/hello.txt"),
            Some(PathBuf::from("/srv/site/hello.txt"))
        );
    }

    #[test]
    fn reroot_nested() {
        let root = Path::new("/srv/site");
        assert_eq!(
            rerooted_path(root, "/a/b/c.css"),
            Some(PathBuf::from("/srv/site/a/b/c.css"))
        );
    }

    #[test]
    fn reroot_skips_dot_and_empty() {
        let root = Path::new("/srv/site");
        assert_eq!(
            rerooted_path(root, "//a/./b"),
            Some(PathBuf::from("/srv/site/a/b"))
        );
    }

    #[test]
    fn reroot_resolves_inner_parent() {
        let root = Path::new("/srv/site");
        assert_eq!(
            rerooted_path(root, "/a/../b.txt"),
            Some(PathBuf::from("/srv/site/b.txt"))
        );
    }

    #[test]
    fn reroot_refuses_escape() {
        let root = Path::new("/srv/site");
        assert_eq!(rerooted_path(root, "/../etc/passwd"), None);
        assert_eq!(rerooted_path(root, "/a/../../etc/passwd"), None);
    }

    #[test]
    fn reroot_refuses_backslash_segments() {
        let root = Path::new("/srv/site");
        assert_eq!(rerooted_path(root, "/..\\..\\boot.ini"), None);
    }

    #[cfg(unix)]
    #[test]
    fn reroot_keeps_unix_colons() {
        let root = Path::new("/srv/site");
        assert_eq!(
            rerooted_path(root, "/a:b.txt"),
            Some(PathBuf::from("/srv/site/a:b.txt"))
        );
    }

    #[test]
    fn escape_passthrough() {
        assert_eq!(html_escape("plain-name_1.txt"), "plain-name_1.txt");
    }

    #[test]
    fn escape_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn listing_links_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let page = listing_page("/", dir.path()).unwrap();
        assert!(page.contains("<title>Directory listing for /</title>"));
        assert!(page.contains(r#"<li><a href="a%20b.txt">a b.txt</a></li>"#));
        assert!(page.contains(r#"<li><a href="sub/">sub/</a></li>"#));
    }

    #[test]
    fn listing_escapes_labels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a<b>.txt"), "").unwrap();

        let page = listing_page("/", dir.path()).unwrap();
        assert!(page.contains("a&lt;b&gt;.txt"));
        assert!(!page.contains("<b>.txt"));
    }

    #[test]
    fn listing_sorts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("C.txt"), "").unwrap();

        let page = listing_page("/", dir.path()).unwrap();
        let a = page.find("a.txt").unwrap();
        let b = page.find("B.txt").unwrap();
        let c = page.find("C.txt").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn listing_escapes_title() {
        let dir = tempfile::tempdir().unwrap();

        let page = listing_page("/<script>/", dir.path()).unwrap();
        assert!(page.contains("Directory listing for /&lt;script&gt;/"));
        assert!(!page.contains("<script>"));
    }
}
