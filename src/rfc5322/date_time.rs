//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! RFC 5322 3.3 `date-time`, including the obsolete forms of 4.3.

use chrono::prelude::*;

use super::lexer::{is_atext, TokenKind};
use super::parser::Parser;
use crate::support::error::ParseError;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct",
    "nov", "dec",
];

impl Parser<'_> {
    /// `date-time := [day-of-week ","] date time [CFWS]`
    pub(super) fn parse_date_time(
        &mut self,
    ) -> Result<DateTime<FixedOffset>, ParseError> {
        self.parse_cfws()?;
        let start = self.current().offset;

        if self.check(TokenKind::Char) {
            // day-of-week; the name itself is not checked against the date
            self.collect_while(|k| TokenKind::Char == k);
            self.parse_cfws()?;
            self.consume(TokenKind::Comma, "Expected ',' after day of week")?;
            self.parse_cfws()?;
        }

        let day = self.parse_day()?;
        self.parse_cfws()?;
        let month = self.parse_month()?;
        self.parse_cfws()?;
        let year = self.parse_year()?;
        self.parse_cfws()?;

        let hour = self.parse_number_n(2)?;
        self.parse_cfws()?;
        self.consume(TokenKind::Colon, "Expected ':'")?;
        self.parse_cfws()?;
        let minute = self.parse_number_n(2)?;
        self.parse_cfws()?;
        let second = if self.matches(TokenKind::Colon) {
            self.parse_cfws()?;
            let second = self.parse_number_n(2)?;
            self.parse_cfws()?;
            second
        } else {
            0
        };

        let zone_offset = self.current().offset;
        let zone = self.parse_zone()?;
        self.parse_cfws()?;
        if !self.check(TokenKind::Eof) {
            return Err(self.make_error("Unexpected data after date-time"));
        }

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            // Leap seconds are folded into the preceding second
            .and_then(|date| date.and_hms_opt(hour, minute, second.min(59)))
            .ok_or_else(|| self.make_error_at("Invalid date", start))?;
        FixedOffset::east_opt(zone)
            .and_then(|zone| zone.from_local_datetime(&naive).single())
            .ok_or_else(|| self.make_error_at("Invalid zone", zone_offset))
    }

    fn parse_day(&mut self) -> Result<u32, ParseError> {
        let digits = self.collect_while(|k| TokenKind::Digit == k);
        if digits.is_empty() || digits.value.len() > 2 {
            return Err(self.make_error_at("Expected day", digits.offset));
        }

        Ok(decimal(&digits.value))
    }

    fn parse_month(&mut self) -> Result<u32, ParseError> {
        let name = self.collect_while(|k| TokenKind::Char == k);
        let offset = name.offset;
        let name = name.into_string().to_ascii_lowercase();
        MONTHS
            .iter()
            .position(|&m| m == name)
            .map(|ix| ix as u32 + 1)
            .ok_or_else(|| self.make_error_at("Expected month name", offset))
    }

    fn parse_year(&mut self) -> Result<i32, ParseError> {
        let digits = self.collect_while(|k| TokenKind::Digit == k);
        let year = decimal(&digits.value) as i32;
        match digits.value.len() {
            2 if year < 50 => Ok(year + 2000),
            2 | 3 => Ok(year + 1900),
            4 => Ok(year),
            _ => Err(self.make_error_at("Expected year", digits.offset)),
        }
    }

    /// Returns the zone as seconds east of UTC.
    fn parse_zone(&mut self) -> Result<i32, ParseError> {
        let sign = if self.matches(TokenKind::Plus) {
            1
        } else if self.matches(TokenKind::Minus) {
            -1
        } else {
            let name = self.collect_while(is_atext);
            if name.is_empty() {
                return Err(self.make_error("Expected zone"));
            }

            let hours = match &name.into_string().to_ascii_uppercase()[..] {
                "EDT" => -4,
                "EST" | "CDT" => -5,
                "CST" | "MDT" => -6,
                "MST" | "PDT" => -7,
                "PST" => -8,
                // UT, GMT, and military zones (which RFC 5322 says to treat
                // as -0000 since they were historically garbled)
                _ => 0,
            };
            return Ok(hours * 3600);
        };

        let offset = self.current().offset;
        let hhmm = self.parse_number_n(4)?;
        let (hh, mm) = (hhmm / 100, hhmm % 100);
        if mm >= 60 {
            return Err(self.make_error_at("Invalid zone", offset));
        }
        Ok(sign * (hh * 3600 + mm * 60) as i32)
    }
}

fn decimal(digits: &[u8]) -> u32 {
    digits
        .iter()
        .fold(0u32, |acc, &d| {
            acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
        })
}
