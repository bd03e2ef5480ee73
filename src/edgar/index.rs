use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::debug;
use url::Url;

pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives";
const FORM_TYPE: &str = "4";

/// One Form 4 filing as listed in a daily master index.
#[derive(Debug, Clone, PartialEq)]
pub struct FilingReference {
    pub cik: String,
    pub company_name: String,
    pub date_filed: NaiveDate,
    /// Path relative to the EDGAR archives root, e.g.
    /// `edgar/data/320193/0000320193-24-000001.txt`.
    pub path: String,
}

impl FilingReference {
    /// The accession number is the filename stem of the archive path.
    pub fn accession_number(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.strip_suffix(".txt").unwrap_or(name)
    }

    pub fn url(&self, archives_url: &Url) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/{}",
            archives_url.as_str().trim_end_matches('/'),
            self.path
        ))?)
    }
}

/// Most recent weekday strictly before `today`. The daily index for the
/// current day is usually not published yet, so we start from yesterday.
pub fn last_business_day(today: NaiveDate) -> NaiveDate {
    let mut date = today - Duration::days(1);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date - Duration::days(1);
    }
    date
}

/// URL of the master index for one day:
/// `daily-index/<year>/QTR<n>/master.<YYYYMMDD>.idx`.
pub fn daily_index_url(date: NaiveDate) -> Result<Url> {
    let quarter = (date.month() - 1) / 3 + 1;
    Ok(Url::parse(&format!(
        "{}/edgar/daily-index/{}/QTR{}/master.{}.idx",
        EDGAR_ARCHIVES_URL,
        date.year(),
        quarter,
        date.format("%Y%m%d"),
    ))?)
}

/// Parses a pipe-delimited master index, keeping only Form 4 rows.
/// Lines are `CIK|Company Name|Form Type|Date Filed|Filename`; header and
/// separator lines do not have five fields and fall through.
pub fn parse_master_index(content: &str) -> Vec<FilingReference> {
    let mut references = Vec::new();

    for line in content.lines() {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != 5 || fields[0].contains("---") {
            continue;
        }
        if fields[2].trim() != FORM_TYPE {
            continue;
        }
        let date_filed = match NaiveDate::parse_from_str(fields[3].trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                debug!("Skipping index line with bad date {:?}: {}", fields[3], e);
                continue;
            }
        };
        references.push(FilingReference {
            cik: fields[0].trim().to_string(),
            company_name: fields[1].trim().to_string(),
            date_filed,
            path: fields[4].trim().to_string(),
        });
    }

    references
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INDEX: &str = "\
Description:           Master Index of EDGAR Dissemination Feed by Company Name
Last Data Received:    March 15, 2024
CIK|Company Name|Form Type|Date Filed|Filename
--------------------------------------------------------------------------------
320193|Apple Inc.|4|2024-03-15|edgar/data/320193/0000320193-24-000050.txt
789019|MICROSOFT CORP|10-K|2024-03-15|edgar/data/789019/0000789019-24-000010.txt
1018724|AMAZON COM INC|4|2024-03-15|edgar/data/1018724/0001018724-24-000033.txt
1318605|Tesla, Inc.|4|not-a-date|edgar/data/1318605/0001318605-24-000007.txt
";

    #[test]
    fn test_parse_master_index_filters_to_form_4() {
        let refs = parse_master_index(SAMPLE_INDEX);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].cik, "320193");
        assert_eq!(refs[0].company_name, "Apple Inc.");
        assert_eq!(refs[1].cik, "1018724");
    }

    #[test]
    fn test_parse_master_index_skips_bad_dates() {
        let refs = parse_master_index(SAMPLE_INDEX);
        assert!(refs.iter().all(|r| r.cik != "1318605"));
    }

    #[test]
    fn test_accession_number_from_path() {
        let refs = parse_master_index(SAMPLE_INDEX);
        assert_eq!(refs[0].accession_number(), "0000320193-24-000050");
    }

    #[test]
    fn test_filing_url() {
        let base = Url::parse(EDGAR_ARCHIVES_URL).unwrap();
        let refs = parse_master_index(SAMPLE_INDEX);
        assert_eq!(
            refs[0].url(&base).unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/data/320193/0000320193-24-000050.txt"
        );
        // Trailing slash on the base must not double up.
        let base = Url::parse("http://127.0.0.1:9999/").unwrap();
        assert_eq!(
            refs[0].url(&base).unwrap().as_str(),
            "http://127.0.0.1:9999/edgar/data/320193/0000320193-24-000050.txt"
        );
    }

    #[test]
    fn test_daily_index_url_quarters() {
        let url = daily_index_url(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.sec.gov/Archives/edgar/daily-index/2024/QTR1/master.20240315.idx"
        );
        let url = daily_index_url(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()).unwrap();
        assert!(url.as_str().contains("/2024/QTR4/master.20241101.idx"));
    }

    #[test]
    fn test_last_business_day() {
        // Monday -> previous Friday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
        assert_eq!(
            last_business_day(monday),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        // Wednesday -> Tuesday
        let wednesday = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert_eq!(
            last_business_day(wednesday),
            NaiveDate::from_ymd_opt(2024, 3, 19).unwrap()
        );
        // Sunday -> Friday
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(
            last_business_day(sunday),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }
}
