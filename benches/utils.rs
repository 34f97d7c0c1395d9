use temperature_analysis::{MonthKey, Series, Station, StationRecord};

/// A made up monthly climate, coldest in January with some year to year variation.
pub fn climate(key: MonthKey, offset: f64) -> f64 {
    let season = 10.0 * (key.month_index() as f64 - 5.5).abs() / 5.5;
    let year = 0.2 * ((key.year() * 7).rem_euclid(5)) as f64;
    offset + season + year
}

pub fn monthly_series(first: i32, last: i32, offset: f64) -> Series {
    (first..=last)
        .flat_map(|year| (1..=12).map(move |month| (year, month)))
        .filter_map(|(year, month)| MonthKey::new(year, month).ok())
        .map(|key| (key, climate(key, offset)))
        .collect()
}

/// Records scattered over the northern mid latitudes, varying in length.
pub fn scattered_stations(count: usize) -> Vec<StationRecord> {
    (0..count)
        .map(|i| {
            let lat = 25.0 + (i * 37 % 400) as f64 / 10.0;
            let lon = -180.0 + (i * 113 % 3600) as f64 / 10.0;
            let first = 1900 + (i * 11 % 60) as i32;
            let id = format!("{:011}", i);
            let station = Station::new(id.as_str(), lat, lon);
            StationRecord::new(
                format!("{}0", id),
                station,
                monthly_series(first, 2000, 0.1 * (i % 10) as f64),
            )
        })
        .collect()
}
