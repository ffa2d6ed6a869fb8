// src/services/availability.rs

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;

use crate::models::business::{Business, BusinessHours, DayHours, Staff, StaffAvailability, WeeklySchedule};

const END_OF_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityReason {
    Bookable,
    OutsideBusinessHours,
    BusinessClosedThisDate,
    StaffUnavailable,
}

impl AvailabilityReason {
    pub fn code(self) -> &'static str {
        match self {
            AvailabilityReason::Bookable => "bookable",
            AvailabilityReason::OutsideBusinessHours => "outside_business_hours",
            AvailabilityReason::BusinessClosedThisDate => "business_closed_this_date",
            AvailabilityReason::StaffUnavailable => "staff_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub bookable: bool,
    pub reason: AvailabilityReason,
}

impl Availability {
    fn ok() -> Self {
        Self { bookable: true, reason: AvailabilityReason::Bookable }
    }

    fn rejected(reason: AvailabilityReason) -> Self {
        Self { bookable: false, reason }
    }
}

/// Decide se o horário pode ser reservado. Função pura, sem I/O.
///
/// Só o início do atendimento precisa cair dentro da janela `[abertura, fechamento)`;
/// a duração é responsabilidade do detector de conflitos.
pub fn validate(
    business: &Business,
    staff: Option<&Staff>,
    requested_start: DateTime<Utc>,
    _duration_minutes: i32,
) -> Availability {
    // Comparação no relógio de parede do estabelecimento, nunca no instante absoluto
    let local = business.to_local(requested_start);
    let weekday = local.weekday();
    let minute_of_day = local.hour() * 60 + local.minute();

    // 1 + 2. Horário de funcionamento
    if !business.appointment_only && !business_hours_allow(&business.business_hours, weekday, minute_of_day) {
        return Availability::rejected(AvailabilityReason::OutsideBusinessHours);
    }

    // 3. Períodos fechados (vale mesmo com appointment_only)
    if business
        .closed_date_ranges
        .iter()
        .any(|range| range.contains(requested_start))
    {
        return Availability::rejected(AvailabilityReason::BusinessClosedThisDate);
    }

    // 4. Agenda própria do profissional
    if let Some(staff) = staff {
        if let StaffAvailability::Custom { days } = &*staff.availability {
            if !weekly_schedule_allows(days, weekday, minute_of_day) {
                return Availability::rejected(AvailabilityReason::StaffUnavailable);
            }
        }
    }

    Availability::ok()
}

fn business_hours_allow(hours: &BusinessHours, weekday: Weekday, minute_of_day: u32) -> bool {
    match hours {
        BusinessHours::AlwaysOpen => true,
        BusinessHours::SameDaily { open, close } => within_window(open, close, minute_of_day),
        BusinessHours::CustomPerWeekday { days } => weekly_schedule_allows(days, weekday, minute_of_day),
    }
}

// Dia sem configuração ou marcado como fechado = não atende
fn weekly_schedule_allows(days: &WeeklySchedule, weekday: Weekday, minute_of_day: u32) -> bool {
    match days.day(weekday) {
        Some(DayHours { closed: true, .. }) | None => false,
        Some(day) => within_window(&day.open, &day.close, minute_of_day),
    }
}

fn within_window(open: &str, close: &str, minute_of_day: u32) -> bool {
    let (Some(open), Some(close)) = (parse_hhmm(open), parse_hhmm(close)) else {
        tracing::warn!("Horário de funcionamento mal configurado: {}-{}", open, close);
        return false;
    };

    // "00:00" no fechamento é fim do dia
    let close = if close == 0 { END_OF_DAY } else { close };

    // Janela vazia (ex: 09:00-09:00) = fechado
    if open == close {
        tracing::warn!("Janela de atendimento vazia: abertura igual ao fechamento");
        return false;
    }

    if open < close {
        open <= minute_of_day && minute_of_day < close
    } else {
        // Janela que atravessa a meia-noite (ex: 22:00-02:00)
        minute_of_day >= open || minute_of_day < close
    }
}

// "HH:MM" -> minutos desde 00:00. Aceita "24:00".
fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;

    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return None;
    }
    Some(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::business::ClosedDateRange;
    use crate::test_utils::{sample_business, sample_staff};
    use chrono::{Duration, TimeZone};
    use sqlx::types::Json;

    fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
        // 10/03/2025 é uma segunda-feira
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
    }

    fn weekday_business() -> Business {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::CustomPerWeekday {
            days: WeeklySchedule {
                monday: Some(DayHours { open: "09:00".into(), close: "17:00".into(), closed: false }),
                sunday: Some(DayHours { open: "09:00".into(), close: "12:00".into(), closed: true }),
                ..WeeklySchedule::default()
            },
        });
        business
    }

    #[test]
    fn always_open_accepts_any_instant() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::AlwaysOpen);

        let start = monday(0, 0);
        for step in 0..(7 * 24 * 4) {
            let instant = start + Duration::minutes(step * 15);
            assert!(validate(&business, None, instant, 30).bookable, "rejeitou {instant}");
        }
    }

    #[test]
    fn monday_window_is_half_open() {
        let business = weekday_business();

        assert_eq!(validate(&business, None, monday(8, 59), 30).reason, AvailabilityReason::OutsideBusinessHours);
        assert!(validate(&business, None, monday(9, 0), 30).bookable);
        assert!(validate(&business, None, monday(16, 59), 30).bookable);
        assert_eq!(validate(&business, None, monday(17, 0), 30).reason, AvailabilityReason::OutsideBusinessHours);
    }

    #[test]
    fn closed_or_missing_weekday_is_rejected() {
        let business = weekday_business();
        let sunday = monday(10, 0) - Duration::days(1);
        let tuesday = monday(10, 0) + Duration::days(1);

        assert!(!validate(&business, None, sunday, 30).bookable);
        assert!(!validate(&business, None, tuesday, 30).bookable);
    }

    #[test]
    fn midnight_close_means_end_of_day() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::SameDaily { open: "18:00".into(), close: "00:00".into() });

        assert!(validate(&business, None, monday(23, 59), 30).bookable);
        assert!(!validate(&business, None, monday(0, 0), 30).bookable);
        assert!(!validate(&business, None, monday(17, 59), 30).bookable);
    }

    #[test]
    fn empty_window_is_closed() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::SameDaily { open: "09:00".into(), close: "09:00".into() });

        assert!(!validate(&business, None, monday(9, 0), 30).bookable);
        assert!(!validate(&business, None, monday(15, 0), 30).bookable);

        // 00:00-00:00 continua sendo o dia inteiro
        business.business_hours = Json(BusinessHours::SameDaily { open: "00:00".into(), close: "00:00".into() });
        assert!(validate(&business, None, monday(3, 0), 30).bookable);
    }

    #[test]
    fn compares_on_local_wall_clock() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::SameDaily { open: "09:00".into(), close: "18:00".into() });
        // UTC-3
        business.utc_offset_minutes = -180;

        // 12:30 UTC = 09:30 local
        assert!(validate(&business, None, monday(12, 30), 30).bookable);
        // 10:00 UTC = 07:00 local
        assert!(!validate(&business, None, monday(10, 0), 30).bookable);
        // 20:30 UTC = 17:30 local
        assert!(validate(&business, None, monday(20, 30), 30).bookable);
    }

    #[test]
    fn closed_range_is_inclusive_and_wins_over_hours() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::AlwaysOpen);
        business.closed_date_ranges = Json(vec![ClosedDateRange {
            start_date_time: monday(0, 0),
            end_date_time: monday(23, 59),
            reason: Some("Feriado".into()),
        }]);

        let at_start = validate(&business, None, monday(0, 0), 30);
        assert_eq!(at_start.reason, AvailabilityReason::BusinessClosedThisDate);
        assert_eq!(validate(&business, None, monday(23, 59), 30).reason, AvailabilityReason::BusinessClosedThisDate);
        assert!(validate(&business, None, monday(23, 59) + Duration::minutes(1), 30).bookable);
    }

    #[test]
    fn appointment_only_skips_hours_but_not_closures_or_staff() {
        let mut business = weekday_business();
        business.appointment_only = true;

        // Terça não está configurada, mas o modo "só com hora marcada" ignora o horário
        let tuesday_night = monday(22, 0) + Duration::days(1);
        assert!(validate(&business, None, tuesday_night, 30).bookable);

        business.closed_date_ranges = Json(vec![ClosedDateRange {
            start_date_time: tuesday_night - Duration::hours(1),
            end_date_time: tuesday_night + Duration::hours(1),
            reason: None,
        }]);
        assert_eq!(
            validate(&business, None, tuesday_night, 30).reason,
            AvailabilityReason::BusinessClosedThisDate
        );
    }

    #[test]
    fn staff_schedule_is_checked_after_business() {
        let mut business = sample_business();
        business.business_hours = Json(BusinessHours::AlwaysOpen);

        let mut staff = sample_staff(business.id);
        staff.availability = Json(StaffAvailability::Custom {
            days: WeeklySchedule {
                monday: Some(DayHours { open: "13:00".into(), close: "19:00".into(), closed: false }),
                ..WeeklySchedule::default()
            },
        });

        assert_eq!(
            validate(&business, Some(&staff), monday(10, 0), 30).reason,
            AvailabilityReason::StaffUnavailable
        );
        assert!(validate(&business, Some(&staff), monday(13, 0), 30).bookable);
        // Sem configuração para terça
        assert_eq!(
            validate(&business, Some(&staff), monday(14, 0) + Duration::days(1), 30).reason,
            AvailabilityReason::StaffUnavailable
        );

        // Quem herda o horário do estabelecimento não tem restrição extra
        staff.availability = Json(StaffAvailability::Inherit);
        assert!(validate(&business, Some(&staff), monday(10, 0), 30).bookable);
    }

    #[test]
    fn malformed_hours_are_rejected() {
        assert_eq!(parse_hhmm("9h"), None);
        assert_eq!(parse_hhmm("24:30"), None);
        assert_eq!(parse_hhmm("24:00"), Some(END_OF_DAY));
        assert!(!within_window("xx", "18:00", 600));
    }
}
