use std::collections::HashSet;

use anyhow::{Context, Result, ensure};

/// Recipient directory backed by a spreadsheet CSV export (first column is
/// the user id). Any failure here is run-fatal: with no audience there is
/// nothing to filter, log against, or send to.
pub struct SheetAudience {
    url: String,
    client: reqwest::Client,
}

impl SheetAudience {
    pub fn new(url: String) -> Self {
        SheetAudience {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch(&self) -> Result<HashSet<i64>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("audience directory unreachable")?;
        ensure!(
            response.status().is_success(),
            "audience directory returned {}",
            response.status()
        );
        let body = response
            .text()
            .await
            .context("reading audience directory response")?;
        Ok(parse_audience_csv(&body))
    }
}

/// First CSV column parsed as ids; header and malformed rows fall out
/// naturally, duplicates collapse into the set.
pub fn parse_audience_csv(body: &str) -> HashSet<i64> {
    body.lines()
        .filter_map(|line| line.split(',').next())
        .filter_map(|field| field.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_dedupes_ids() {
        let body = "user_id,first_name,username\n\
                    101,Alice,alice\n\
                    102,Bob,\n\
                    102,Bob again,bob\n\
                    oops,not,a row\n\
                    103,,\n";
        assert_eq!(parse_audience_csv(body), HashSet::from([101, 102, 103]));
    }

    #[test]
    fn empty_body_is_empty_audience() {
        assert!(parse_audience_csv("").is_empty());
        assert!(parse_audience_csv("user_id\n").is_empty());
    }
}
