pub mod podtopologyspread;
