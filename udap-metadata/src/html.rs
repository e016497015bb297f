// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use reqwest::Url;

use crate::CommunitySummary;

/// Render the community listing, linking each community to `metadata_url?community=<name>`.
pub fn render_communities_html(communities: &[CommunitySummary], metadata_url: &Url) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>UDAP Communities</title>\n</head>\n<body>\n<h1>UDAP Communities</h1>\n<ul>\n",
    );

    for community in communities {
        let mut link = metadata_url.clone();
        link.query_pairs_mut()
            .clear()
            .append_pair("community", &community.name);

        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_html(link.as_str()),
            escape_html(&community.name)
        ));
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
